//! Family membership rules against a migrated database.

use kinnect_database::testing::{add_member, count_rows, insert_family, insert_user, test_pool};
use kinnect_database::{FamilySettings, MemberRole, ServiceError};
use kinnect_families::{FamilyService, FamilyUpdate, MemberTarget, MemberUpdate, NewFamily, NewMember};

fn new_family(name: &str) -> NewFamily {
    NewFamily {
        name: name.to_string(),
        description: None,
        settings: None,
    }
}

fn by_id(user_id: &str, role: Option<MemberRole>) -> NewMember {
    NewMember {
        target: MemberTarget::UserId(user_id.to_string()),
        role,
    }
}

#[tokio::test]
async fn creating_a_family_makes_the_creator_its_admin() {
    let (pool, _dir) = test_pool().await;
    let user = insert_user(&pool, "u@example.com").await;
    let service = FamilyService::new(pool.clone());

    let family = service.create(&user, new_family("Smiths")).await.unwrap();

    let (member_user, role): (String, MemberRole) =
        sqlx::query_as("SELECT user_id, role FROM family_members WHERE family_id = ?")
            .bind(&family.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(member_user, user);
    assert_eq!(role, MemberRole::Admin);
    assert_eq!(count_rows(&pool, "family_members").await, 1);
    assert_eq!(family.settings, FamilySettings::default());
}

#[tokio::test]
async fn listing_shows_role_and_member_count() {
    let (pool, _dir) = test_pool().await;
    let owner = insert_user(&pool, "owner@example.com").await;
    let member = insert_user(&pool, "member@example.com").await;
    let family = insert_family(&pool, &owner, "Joneses").await;
    add_member(&pool, &family, &member, MemberRole::Member).await;

    let service = FamilyService::new(pool);
    let families = service.list_for_user(&member).await.unwrap();

    assert_eq!(families.len(), 1);
    assert_eq!(families[0].role, MemberRole::Member);
    assert_eq!(families[0].member_count, 2);
}

#[tokio::test]
async fn outsiders_cannot_see_a_family() {
    let (pool, _dir) = test_pool().await;
    let owner = insert_user(&pool, "owner@example.com").await;
    let outsider = insert_user(&pool, "outsider@example.com").await;
    let family = insert_family(&pool, &owner, "Private").await;

    let service = FamilyService::new(pool);
    let error = service.get(&family, &outsider).await.unwrap_err();
    assert!(matches!(error, ServiceError::Forbidden(_)));

    let details = service.get(&family, &owner).await.unwrap();
    assert_eq!(details.members.len(), 1);
    assert_eq!(details.members[0].user.first_name, "owner");
}

#[tokio::test]
async fn only_admins_update_the_family() {
    let (pool, _dir) = test_pool().await;
    let owner = insert_user(&pool, "owner@example.com").await;
    let member = insert_user(&pool, "member@example.com").await;
    let family = insert_family(&pool, &owner, "Old name").await;
    add_member(&pool, &family, &member, MemberRole::Member).await;

    let service = FamilyService::new(pool);
    let update = FamilyUpdate {
        name: Some("New name".to_string()),
        ..FamilyUpdate::default()
    };

    assert!(matches!(
        service.update(&family, &member, update.clone()).await,
        Err(ServiceError::Forbidden(_))
    ));
    let updated = service.update(&family, &owner, update).await.unwrap();
    assert_eq!(updated.name, "New name");
}

#[tokio::test]
async fn members_without_invite_permission_cannot_add() {
    let (pool, _dir) = test_pool().await;
    let owner = insert_user(&pool, "owner@example.com").await;
    let member = insert_user(&pool, "member@example.com").await;
    let newcomer = insert_user(&pool, "new@example.com").await;
    let family = insert_family(&pool, &owner, "Closed").await;
    add_member(&pool, &family, &member, MemberRole::Member).await;

    let service = FamilyService::new(pool);
    let error = service
        .add_member(&family, &member, by_id(&newcomer, None))
        .await
        .unwrap_err();
    assert!(matches!(error, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn admins_add_members_by_email() {
    let (pool, _dir) = test_pool().await;
    let owner = insert_user(&pool, "owner@example.com").await;
    let newcomer = insert_user(&pool, "cousin@example.com").await;
    let family = insert_family(&pool, &owner, "Open").await;

    let service = FamilyService::new(pool);
    let added = service
        .add_member(
            &family,
            &owner,
            NewMember {
                target: MemberTarget::Email("Cousin@Example.com".to_string()),
                role: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(added.member.user_id, newcomer);
    assert_eq!(added.member.role, MemberRole::Member);
    assert!(!added.member.permissions.can_invite);

    let duplicate = service
        .add_member(&family, &owner, by_id(&newcomer, None))
        .await
        .unwrap_err();
    assert!(matches!(duplicate, ServiceError::BadRequest(_)));

    let unknown = service
        .add_member(
            &family,
            &owner,
            NewMember {
                target: MemberTarget::Email("nobody@example.com".to_string()),
                role: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(unknown, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn removing_the_creator_is_rejected() {
    let (pool, _dir) = test_pool().await;
    let owner = insert_user(&pool, "owner@example.com").await;
    let admin = insert_user(&pool, "admin@example.com").await;
    let family = insert_family(&pool, &owner, "Smiths").await;
    add_member(&pool, &family, &admin, MemberRole::Admin).await;

    let service = FamilyService::new(pool);
    let error = service.remove_member(&family, &admin, &owner).await.unwrap_err();

    assert!(matches!(error, ServiceError::BadRequest(_)));
    assert_eq!(error.to_string(), "Cannot remove the family creator");
}

#[tokio::test]
async fn the_last_admin_cannot_be_demoted_or_removed() {
    let (pool, _dir) = test_pool().await;
    let owner = insert_user(&pool, "owner@example.com").await;
    let other = insert_user(&pool, "other@example.com").await;
    let family = insert_family(&pool, &owner, "Guarded").await;
    add_member(&pool, &family, &other, MemberRole::Member).await;

    let service = FamilyService::new(pool.clone());

    // Hand the admin role from the creator to `other`.
    service
        .update_member(
            &family,
            &owner,
            &other,
            MemberUpdate {
                role: Some(MemberRole::Admin),
                permissions: None,
            },
        )
        .await
        .unwrap();
    service
        .update_member(
            &family,
            &other,
            &owner,
            MemberUpdate {
                role: Some(MemberRole::Member),
                permissions: None,
            },
        )
        .await
        .unwrap();

    let demote = service
        .update_member(
            &family,
            &other,
            &other,
            MemberUpdate {
                role: Some(MemberRole::Member),
                permissions: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(demote.to_string(), "Family must have at least one admin");

    let leave = service.remove_member(&family, &other, &other).await.unwrap_err();
    assert_eq!(leave.to_string(), "Family must have at least one admin");
    assert_eq!(count_rows(&pool, "family_members").await, 2);
}

#[tokio::test]
async fn members_may_leave_on_their_own() {
    let (pool, _dir) = test_pool().await;
    let owner = insert_user(&pool, "owner@example.com").await;
    let member = insert_user(&pool, "member@example.com").await;
    let bystander = insert_user(&pool, "bystander@example.com").await;
    let family = insert_family(&pool, &owner, "Leavers").await;
    add_member(&pool, &family, &member, MemberRole::Member).await;
    add_member(&pool, &family, &bystander, MemberRole::Member).await;

    let service = FamilyService::new(pool.clone());

    let error = service.remove_member(&family, &bystander, &member).await.unwrap_err();
    assert!(matches!(error, ServiceError::Forbidden(_)));

    service.remove_member(&family, &member, &member).await.unwrap();
    assert_eq!(count_rows(&pool, "family_members").await, 2);
}

#[tokio::test]
async fn only_the_creator_deletes_and_the_graph_goes_with_it() {
    let (pool, _dir) = test_pool().await;
    let owner = insert_user(&pool, "owner@example.com").await;
    let admin = insert_user(&pool, "admin@example.com").await;
    let family = insert_family(&pool, &owner, "Temporary").await;
    add_member(&pool, &family, &admin, MemberRole::Admin).await;

    let service = FamilyService::new(pool.clone());
    assert!(matches!(
        service.delete(&family, &admin).await,
        Err(ServiceError::Forbidden(_))
    ));

    service.delete(&family, &owner).await.unwrap();
    assert_eq!(count_rows(&pool, "families").await, 0);
    assert_eq!(count_rows(&pool, "family_members").await, 0);
}

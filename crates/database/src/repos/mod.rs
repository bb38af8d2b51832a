//! Repositories over the family and post tables

pub mod family_repository;
pub mod member_repository;
pub mod post_repository;

pub use family_repository::*;
pub use member_repository::*;
pub use post_repository::*;

use crate::types::{ServiceError, ServiceResult};

/// Serialize a value for one of the JSON TEXT columns.
pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> ServiceResult<String> {
    serde_json::to_string(value).map_err(ServiceError::internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::FamilySettings;

    #[test]
    fn settings_encode_as_camel_case_json() {
        let json = encode_json(&FamilySettings::default()).unwrap();
        assert_eq!(json, r#"{"isPrivate":true,"allowMemberInvites":false}"#);
    }
}

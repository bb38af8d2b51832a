//! # Kinnect Families Crate
//!
//! Families and their membership rules, plus the events scheduled inside a
//! family with attendance and invitations.
//!
//! Every family keeps at least one admin, and its creator can only leave by
//! deleting the family or their account.

pub mod services;
pub mod types;

pub use services::{EventService, FamilyService};
pub use types::{
    EventDetails, EventFilter, EventUpdate, FamilyDetails, FamilyUpdate, InvitationDetails,
    MemberTarget, MemberUpdate, NewEvent, NewFamily, NewMember,
};

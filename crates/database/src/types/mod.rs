//! Shared error and result types

pub mod errors;

pub use errors::{DatabaseError, ServiceError};

pub type DatabaseResult<T> = Result<T, DatabaseError>;
pub type ServiceResult<T> = Result<T, ServiceError>;

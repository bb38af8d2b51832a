//! # Kinnect Media Crate
//!
//! Media uploads: the object storage abstraction with its S3 and local-disk
//! backends, best-effort thumbnail rendering, and the service that keeps
//! stored objects and `media` rows in step.

pub mod service;
pub mod storage;
pub mod thumbnail;

pub use service::{remove_objects, MediaService, UploadedFile};
pub use storage::{from_config as store_from_config, LocalStore, ObjectStore, StorageError};
#[cfg(feature = "s3")]
pub use storage::S3Store;

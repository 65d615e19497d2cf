//! Core identity types
//!
//! - [`AddressSpaceId`]: identifies the process/boot epoch that made an id
//! - [`ObjectId`]: identifies one exported object
//! - [`Fault`]: application-level failure of a remote method
//! - [`RemoteError`]: everything else that can go wrong

mod address_space;
mod error;
mod fault;
mod object_id;

pub use address_space::AddressSpaceId;
pub use error::{RemoteError, Result};
pub use fault::Fault;
pub use object_id::{random_ids_enabled, ObjectId, RANDOM_IDS_ENV};

//! # pqauth-storage
//!
//! Store collaborator interface for credentials, sessions, policies and custody shares, with
//! an in-memory backend. Durability belongs to whichever backend implements [`Storage`].

#![warn(clippy::all)]

pub mod column_families;
pub mod errors;
pub mod memory;
pub mod traits;

pub use column_families::*;
pub use errors::{Result, StorageError};
pub use memory::MemoryStorage;
pub use traits::{Batch, BatchExt, Storage};

//! Record of installed components and its persistence.
//!
//! The record is the single source of truth for "is this installed": the slave
//! dispatcher only runs adapters found here, and the installer refuses to
//! reinstall anything found here unless forced.

pub mod store;
pub mod types;

pub use store::{INSTALLED_FILE_NAME, InstalledStore};
pub use types::{InstalledComponentRecord, InstalledRegistry};

//! Master-side configuration in `conduit.toml`.
//!
//! The file lists the slave clients the master delivers actions to:
//!
//! ```toml
//! [[slave]]
//! name = "wiki-host"
//! type = "ExternalCGIPost"
//! tools = ["Wiki", "TicketTracker"]
//!
//! [slave.params]
//! url = "https://wiki.example.org/cgi-bin/conduit-slave.cgi"
//! timeout_secs = 10
//! ```

pub mod parser;
pub mod schema;
pub mod store;

pub use parser::{parse_conduit_toml, parse_conduit_toml_str};
pub use schema::{ConduitConfig, ConnectionParams, RegisteredSlaveClient, SlaveClientEntry};
pub use store::ConfigStore;

/// File name of the master configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "conduit.toml";

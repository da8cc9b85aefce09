//! Sender implementations and the wire format between master and slave.

pub mod cgi_post;
pub mod local;
pub mod wire;

pub use cgi_post::ExternalCgiPost;
pub use local::LocalSender;
pub use wire::{SUCCESS_MARKER, SlaveRequest};

//! OpenFlow 1.0 transport: wire messages, connection handshake, and the
//! switch-facing listener. This is the "external collaborator" layer the
//! core load-balancing logic in [`crate::balancer`] is built against.

pub mod connection;
pub mod message;
pub mod server;

pub use connection::{SwitchEvent, SwitchSender};

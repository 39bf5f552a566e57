//! SDN OpenFlow load balancer control-plane.
//!
//! ```text
//! Switch --(OpenFlow)--> openflow::connection --> balancer::Balancer --> openflow::message --(OpenFlow)--> Switch
//!                                                      |
//!                                     registry / prober / flow_memory / rules
//! ```
//!
//! One [`balancer::Balancer`] actor runs per switch connection, ARP-probing
//! backend liveness, maintaining flow affinity, and installing the
//! `flow_mod`/`packet_out` rules that let the switch itself NAT and forward
//! every packet after a connection's first.

pub mod actor;
pub mod arp_responder;
pub mod balancer;
pub mod config;
pub mod error;
pub mod mac;
pub mod openflow;
pub mod packet;

pub use config::Config;

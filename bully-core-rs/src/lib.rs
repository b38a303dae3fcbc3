//! Bully Election Core Library
//!
//! Leader election among a fixed group of ranked processes. Rank doubles as
//! priority: a process defers to any live higher rank and declares itself
//! leader only when no higher rank answers within the response timeout.
//! Ships with an in-process network for simulation and a UDP network.

pub mod types;
pub mod error;
pub mod config;
pub mod guard;
pub mod mailbox;
pub mod transport;
pub mod memory;
pub mod udp;
pub mod election;
mod listener;
pub mod node;

pub use types::*;
pub use error::{BullyError, Result};
pub use config::{ElectionConfig, NodeConfig, UdpGroupConfig};
pub use guard::ElectionGuard;
pub use mailbox::Mailbox;
pub use transport::{Link, Transport};
pub use memory::MemoryNetwork;
pub use election::Outcome;
pub use node::Node;

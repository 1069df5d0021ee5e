//! # Link Module
//!
//! Ground-station link: connection lifecycle, consumer handle and operator console.

pub mod command;
pub mod console;
pub mod manager;
pub mod state;

pub use command::{LinkHandle, LinkRequest, OutgoingCommand};
pub use console::{Console, ConsoleSink};
pub use manager::{LinkConfig, LinkManager, LinkStats};
pub use state::LinkState;

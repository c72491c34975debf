//! Adapters: the CLI that drives the controllers, and the real
//! implementations of the outbound ports.

pub mod inbound;
pub mod outbound;

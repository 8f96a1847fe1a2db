//! Port traits (interfaces for adapters).
//!
//! The lifecycle coordinator and the HTTP service depend on these traits,
//! not on concrete gateways.

mod gateway;

pub use gateway::PixGateway;

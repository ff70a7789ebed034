//! Shared vocabulary: constants and the network context.

pub mod network;
pub mod paths;

pub use network::NetworkContext;

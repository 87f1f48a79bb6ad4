pub mod config;
pub mod network;
pub mod persist;

pub use config::NetworkConfig;
pub use network::{ForwardPass, Network};
pub use persist::LoadPolicy;

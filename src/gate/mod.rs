//! Resource gate: named operations over shared quota categories.

mod connection;
mod rules;

pub use connection::ResourceGate;
pub use rules::{CategoryConfig, GateConfig, LimitRule, READ_FILE, RESOLVE_ADDRESS};

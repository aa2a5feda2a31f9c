pub mod bridge;
pub mod prompt;

pub use bridge::{AiBridge, BridgeConfig, Outcome, RequestState};

pub mod client;

pub use client::{ChatClient, ChatError, Exchange};

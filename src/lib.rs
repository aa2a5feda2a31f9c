pub mod ai;
pub mod chat;
pub mod cli;
pub mod core;
pub mod credentials;
pub mod openai;
pub mod render;
pub mod session;
pub mod storage;

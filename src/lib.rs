pub mod chat;
pub mod cli;
pub mod core;
pub mod gateway;
pub mod render;
pub mod store;
pub mod voice;

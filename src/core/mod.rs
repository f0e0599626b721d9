pub mod config;
pub mod error;
pub mod message;

#[cfg(test)]
mod tests;

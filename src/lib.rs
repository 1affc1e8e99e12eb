//! CalPal - a streaming AI session client for an AR calorie assistant.

pub mod config;
pub mod dialogue;
pub mod live;

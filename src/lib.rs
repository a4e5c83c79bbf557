pub mod config;
pub mod control;
pub mod dial;
pub mod error;
pub mod hardware;
pub mod network;
pub mod sink;

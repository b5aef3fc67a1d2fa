pub mod anchor;
pub mod config;
pub mod patch;
pub mod runner;
pub mod store;

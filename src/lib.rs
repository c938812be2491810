pub mod agent;
pub mod aggregator;
pub mod article;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod providers;
pub mod server;
pub mod speech;
pub mod tools;

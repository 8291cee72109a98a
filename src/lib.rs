pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod processors;
pub mod readers;
pub mod strategies;
pub mod utils;
pub mod writers;

pub use error::{BenchError, Result};

pub mod chain;
pub mod config;
pub mod contracts;
pub mod model;
pub mod token;
pub mod tx;

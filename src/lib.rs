// Library exports for the shd daemon

pub mod cli;
pub mod config;
pub mod daemon;
pub mod dispatcher;
pub mod error;
pub mod logging;

//! Server module for fleetops
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Startup configuration checks
//! - `init`: Service wiring, router and run loop

pub mod config;
mod init;
mod loader;
mod validation;

pub use init::{build_router, run, AppContext};
pub use loader::load_config;
pub use validation::validate_config;

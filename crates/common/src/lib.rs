//! pagecheck common library
//!
//! Configuration, environment resolution, errors and the report data model
//! shared by the pagecheck crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{BrowserKind, EnvironmentTag, HarnessConfig};
pub use error::{Error, Result};
pub use types::*;

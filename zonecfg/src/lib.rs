//! Driver for the illumos `zonecfg` command.
//!
//! Requests such as "create zone X with brand Y" or "add an rctl resource"
//! are rendered into zonecfg command files and executed; the `info` report
//! is parsed back into a [`ParsedConfig`].

pub mod config;
pub mod driver;
pub mod error;
pub mod fs;
pub mod host;
pub mod info;
pub mod mock;
pub mod process;
pub mod resources;
pub mod script;
pub mod value;

pub use config::DriverConfig;
pub use driver::{OperationRequest, OperationResult, Outcome, Zonecfg};
pub use error::{Error, Result};
pub use info::{parse_info, ParsedConfig, ResourceRecord};
pub use script::{CommandScript, Properties};
pub use value::{parse_value, Value};

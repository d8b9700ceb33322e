pub mod config;
pub mod error;
pub mod oracle;
pub mod types;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use oracle::{OracleClient, OracleRequest};
pub use types::*;

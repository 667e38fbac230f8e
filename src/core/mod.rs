//! Descriptor, configuration and command-line composition

pub mod cmd;
pub mod config;
pub mod error;
pub mod invocation;

pub use cmd::{Cmd, CmdBuilder, CmdHandle, CmdId, CmdOutcome, CmdRequest, CmdStatus};
pub use config::{Config, Parser};
pub use error::{Error, Result};
pub use invocation::Invocation;

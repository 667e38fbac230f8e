//! # gtags-engine
//!
//! Run GNU Global (`gtags` / `global`) against a tag database on a dedicated
//! worker, with cancellation, and get the tool's output back either through a
//! completion callback or a blocking call.
//!
//! ```rust,no_run
//! use gtags_engine::{Cmd, CmdEngine, CmdId, Config};
//!
//! let engine = CmdEngine::new(Config::default());
//! let cmd = Cmd::builder(CmdId::FindDefinition)
//!     .db_path("/home/me/project")
//!     .tag("main")
//!     .build();
//!
//! if engine.run(&cmd, None) {
//!     println!("{}", cmd.result());
//! }
//! ```
//!
//! The engine only runs the tool and classifies the outcome; database
//! arbitration and presentation are collaborators (see [`db`] and
//! [`runtime::surface`]).

pub mod core;
pub mod db;
pub mod runtime;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::core::{
    cmd::{Cmd, CmdBuilder, CmdHandle, CmdId, CmdStatus},
    config::{Config, Parser},
    error::{Error, Result},
    invocation::Invocation,
};
pub use crate::db::{DbHandle, DbManager, DbRegistry, UpdateQueue};
pub use crate::runtime::{
    engine::{CmdEngine, CompletionCallback, RunHandle},
    pump::{EventPump, NoPump, PumpStatus},
    surface::{ActivityOptions, CancelHandle, CancelSurface, ProcessWatch, ProgressSurface, SilentSurface},
};

//! A scripting engine that runs independently written analysis tasks
//! against a measurement data source and merges what they draw into a set
//! of views.
//!
//! Tasks run strictly in registration order. A dependency counts as
//! resolved only if the named task already ran and ended valid, so a task
//! must be registered after everything it depends on.
//!
//! ```
//! use taskview::{DataSet, Engine, EngineConfig, Host, Recorder, TaskConfig};
//!
//! let recorder = Recorder::new();
//! let mut engine = Engine::new(EngineConfig::default(), Host::new(recorder.clone()));
//!
//! engine
//!     .register(TaskConfig::new("a").view("plot:1"), |cx| {
//!         cx.push(DataSet::new(vec![0.0, 1.0], vec![0.0, 1.0]));
//!         Ok(().into())
//!     })
//!     .unwrap();
//!
//! let report = engine.run().unwrap();
//! assert_eq!(report.views, vec!["plot"]);
//! assert_eq!(recorder.view_titles(), vec!["plot"]);
//! ```
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
mod error;
pub mod gate;
pub mod host;
#[cfg(feature = "logging")]
pub mod logging;
pub mod message;
pub mod persist;
pub mod profiler;
pub mod task;
pub mod view;

pub use crate::config::{EngineConfig, TaskConfig, ViewConfig};
pub use crate::engine::{Engine, HookContext, Phase, RunContext, RunReport};
pub use crate::error::*;
pub use crate::host::{
    BufferReport, CancelToken, Catalog, FileStore, Host, InputValue, MemoryStore, Quiet,
    Recorder, StaticInputs,
};
pub use crate::message::{Category, Message, MessageCollector};
pub use crate::profiler::Profiler;
pub use crate::task::{Compute, DataSet, SourceType, Stage, Task, Verdict, ViewTarget};
pub use crate::view::{Arg, PropertyKind, ViewProperties};

/// Result type returned by compute steps and hooks.
pub type TaskResult<T = ()> = anyhow::Result<T>;

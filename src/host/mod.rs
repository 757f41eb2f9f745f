//! Interfaces to everything the engine drives but does not implement: the
//! visualization API, user inputs, translations, storage, progress and the
//! report surface.
#[cfg(feature = "console")]
mod console;
mod fs;
mod memory;

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::error::PersistenceError;

#[cfg(feature = "console")]
pub use crate::host::console::{BarProgress, ConsoleReport};
pub use crate::host::fs::FileStore;
pub use crate::host::memory::{
    BufferReport, Call, Catalog, GraphicRecord, MemoryStore, Printed, Quiet, RecordLog, Recorder,
    ReportLog, StaticInputs,
};

/// A value entered by the user for a named input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Text(String),
    List(Vec<String>),
    Number(f64),
    Flag(bool),
}

impl InputValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InputValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Text(value.to_string())
    }
}

impl From<Vec<&str>> for InputValue {
    fn from(value: Vec<&str>) -> Self {
        InputValue::List(value.into_iter().map(String::from).collect())
    }
}

/// User-entered parameters and the measurement channels they may refer to.
pub trait Inputs {
    /// The resolved value of an input.
    fn value(&self, name: &str) -> Option<InputValue>;

    /// The value exactly as entered, before any resolution.
    fn raw_value(&self, name: &str) -> Option<InputValue>;

    fn is_known(&self, name: &str) -> bool;

    /// Whether the measurement data source has a channel of this name.
    fn has_channel(&self, channel: &str) -> bool;
}

pub trait Translate {
    /// Looks up `key` and substitutes `{0}`, `{1}`, ... with `args`.
    fn translate(&self, key: &str, args: &[&str]) -> String;
}

pub trait Persistence {
    fn read_json(&self, locator: &str) -> Result<Value, PersistenceError>;

    fn write_json(&mut self, locator: &str, value: &Value) -> Result<(), PersistenceError>;

    /// Size in bytes of the resource behind `locator`, `None` if it doesn't
    /// exist.
    fn size(&self, locator: &str) -> Option<u64>;
}

pub trait Progress {
    /// Cancellation poll, consulted between tasks and inside point loops.
    fn can_continue(&self) -> bool;

    fn set_length(&self, _: u64) {}

    fn set_progress(&self, step: u64);

    fn set_status_text(&self, text: &str);

    fn finish(&self) {}
}

/// The surface collected messages are printed to.
pub trait Report {
    fn header(&mut self, text: &str);

    fn line(&mut self, text: &str);

    fn paragraph(&mut self, text: &str);

    /// Bring the surface to the front, used when errors were reported.
    fn show(&mut self);
}

/// A drawable series owned by the host.
pub trait Graphic {
    fn name(&self) -> &str;

    fn add_point(&mut self, x: f64, y: f64);

    fn add_color_point(&mut self, x: f64, y: f64, color: f64);

    fn set_limits(&mut self, min: f64, max: f64);

    fn set_scale(&mut self, value: f64, color: u32);
}

/// One positional argument of a view call.
#[derive(Clone, Copy)]
pub enum CallArg<'a> {
    Graphic(&'a dyn Graphic),
    Int(i64),
    Number(f64),
    Bool(bool),
    Text(&'a str),
}

impl Debug for CallArg<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallArg::Graphic(graphic) => write!(f, "Graphic({})", graphic.name()),
            CallArg::Int(value) => write!(f, "{value}"),
            CallArg::Number(value) => write!(f, "{value:?}"),
            CallArg::Bool(value) => write!(f, "{value}"),
            CallArg::Text(value) => write!(f, "{value:?}"),
        }
    }
}

pub trait View {
    fn apply(&mut self, method: &str, args: &[CallArg<'_>]) -> anyhow::Result<()>;

    fn commit(&mut self) -> anyhow::Result<()>;
}

pub trait Visualization {
    fn create_view(&mut self, title: &str, kind: &str) -> anyhow::Result<Box<dyn View>>;

    fn create_graphic(
        &mut self,
        name: &str,
        axis_label: &str,
        color: u32,
    ) -> anyhow::Result<Box<dyn Graphic>>;
}

/// Shared flag a host sets to abort a run at the next loop boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Every collaborator the engine talks to during a run.
pub struct Host {
    pub visualization: Box<dyn Visualization>,
    pub inputs: Box<dyn Inputs>,
    pub translate: Box<dyn Translate>,
    pub store: Box<dyn Persistence>,
    pub progress: Box<dyn Progress>,
    pub report: Box<dyn Report>,
}

impl Host {
    /// A host drawing into `visualization`, with empty inputs, an in-memory
    /// store and no terminal output.
    pub fn new(visualization: impl Visualization + 'static) -> Self {
        Self {
            visualization: Box::new(visualization),
            inputs: Box::new(StaticInputs::default()),
            translate: Box::new(Catalog::english()),
            store: Box::new(MemoryStore::default()),
            progress: Box::new(Quiet::default()),
            report: Box::new(BufferReport::default()),
        }
    }

    /// Like [`Host::new`], but reporting to the terminal with a progress bar.
    #[cfg(feature = "console")]
    pub fn terminal(visualization: impl Visualization + 'static, token: CancelToken) -> Self {
        Self::new(visualization)
            .with_progress(BarProgress::new(token))
            .with_report(ConsoleReport::default())
    }

    pub fn with_inputs(mut self, inputs: impl Inputs + 'static) -> Self {
        self.inputs = Box::new(inputs);
        self
    }

    pub fn with_translate(mut self, translate: impl Translate + 'static) -> Self {
        self.translate = Box::new(translate);
        self
    }

    pub fn with_store(mut self, store: impl Persistence + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn with_progress(mut self, progress: impl Progress + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn with_report(mut self, report: impl Report + 'static) -> Self {
        self.report = Box::new(report);
        self
    }
}

impl Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Host(*)")
    }
}

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::engine::Phase;
use crate::task::Stage;

/// Returned when a task cannot be added to the registry. The task is
/// dropped, the rest of the run is unaffected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Task name must not be empty")]
    InvalidName,

    #[error("Task '{0}' is already registered")]
    DuplicateName(String),

    #[error("Invalid task configuration: {0}")]
    Config(String),
}

/// A stage-level check that did not pass. The task status becomes `false`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Input '{0}' is not known")]
    UnknownInput(String),

    #[error("Input '{0}' is neither a channel, a channel list nor a usable file")]
    InvalidSource(String),

    #[error("Required task '{0}' is not valid")]
    MissingDependency(String),

    #[error("Excluded task '{0}' is valid")]
    ExcludedDependency(String),

    #[error("None of the tasks [{}] is valid", .0.join(", "))]
    NoSoftDependency(Vec<String>),

    #[error("No usable view target in '{0}'")]
    NoViewTarget(String),

    #[error("No data sets to draw")]
    NoDataSets,

    #[error("Compute step reported the task as invalid")]
    Rejected,

    #[error("Data set {set} has an invalid sample at index {index}")]
    InvalidSample { set: usize, index: usize },

    #[error("Run was cancelled")]
    Cancelled,
}

/// Failure of the user supplied compute step, caught at the task boundary.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error(transparent)]
    Userland(#[from] anyhow::Error),

    #[error("Compute step panicked: {0}")]
    Panic(String),

    #[error("Couldn't load stored data sets.\n{0}")]
    Load(#[from] PersistenceError),

    #[error("Couldn't create graphic.\n{0}")]
    Graphic(anyhow::Error),
}

/// A single view instruction that could not be applied. Only that
/// instruction is skipped.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("'{method}' takes between 1 and {max} arguments, got {count}")]
    Arity {
        method: String,
        count: usize,
        max: usize,
    },

    #[error("'{method}' refers to unknown graphic #{index}")]
    UnknownGraphic { method: String, index: usize },

    #[error("View '{0}' was never created")]
    UnknownView(String),

    #[error("'{method}' failed on view '{view}'.\n{source}")]
    Host {
        view: String,
        method: String,
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("No locator configured for {0}")]
    NoLocator(&'static str),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("Couldn't access '{0}'.\n{1}")]
    Io(String, #[source] std::io::Error),

    #[error("Malformed document '{0}'.\n{1}")]
    Format(String, #[source] serde_json::Error),

    #[error("No stored data for task '{task}' in '{locator}'")]
    MissingTask { locator: String, task: String },

    #[error("Task '{task}' not dumped, data set {set} has an invalid sample at index {index}")]
    InvalidSample {
        task: String,
        set: usize,
        index: usize,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Hook '{0}' is already registered")]
    DuplicateHook(String),

    #[error("Hook '{name}' is not registered, can't schedule it for {phase:?}")]
    UnknownHook { phase: Phase, name: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read configuration '{0}'.\n{1}")]
    Read(Utf8PathBuf, #[source] std::io::Error),

    #[error("Couldn't parse configuration '{0}'.\n{1}")]
    Parse(Utf8PathBuf, #[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("Engine has already completed a run")]
    AlreadyRan,
}

/// Failure recorded for one task at one stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compute(#[from] ComputeError),
}

impl StageError {
    /// Whether the failure is a fault (reported as error) rather than an
    /// unmet precondition (reported as hint).
    pub fn is_fault(&self) -> bool {
        match self {
            StageError::Compute(_) => true,
            StageError::Validation(ValidationError::InvalidSample { .. }) => true,
            StageError::Validation(_) => false,
        }
    }
}

/// A stage failure tagged with the stage it happened in.
#[derive(Debug, Error)]
#[error("Task '{task}' failed at {stage}: {error}")]
pub struct TaskFailure {
    pub task: String,
    pub stage: Stage,
    #[source]
    pub error: StageError,
}

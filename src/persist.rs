//! The dump document: data sets of selected tasks, stored as JSON so a later
//! run can load them for comparison.
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PersistenceError;
use crate::host::Persistence;
use crate::task::{DataSet, Task};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub data: BTreeMap<String, SavedTask>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SavedTask {
    pub title: String,
    pub data_sets: Vec<DataSet>,
    /// Keys written by other tools, preserved as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub generator: String,
    pub version: String,
    /// Seconds since the unix epoch.
    pub created: u64,
    /// Tasks written by the last dump.
    pub tasks: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    fn current(tasks: Vec<String>, previous: Metadata) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            .unwrap_or_default();

        Self {
            generator: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created,
            tasks,
            extra: previous.extra,
        }
    }
}

pub fn read(store: &dyn Persistence, locator: &str) -> Result<Document, PersistenceError> {
    let value = store.read_json(locator)?;
    serde_json::from_value(value).map_err(|err| PersistenceError::Format(locator.to_string(), err))
}

/// Data sets stored for `task` in the document at `locator`.
pub fn load_data_sets(
    store: &dyn Persistence,
    locator: &str,
    task: &str,
) -> Result<Vec<DataSet>, PersistenceError> {
    let mut document = read(store, locator)?;

    match document.data.remove(task) {
        Some(saved) => Ok(saved.data_sets),
        None => Err(PersistenceError::MissingTask {
            locator: locator.to_string(),
            task: task.to_string(),
        }),
    }
}

/// Outcome of [`dump`].
#[derive(Debug, Default)]
pub struct Dump {
    /// Tasks written, in the order given.
    pub written: Vec<String>,
    /// Tasks left out, their previous entry is kept.
    pub rejected: Vec<PersistenceError>,
}

/// Writes the data sets of `tasks` to `locator`. Entries of tasks not in
/// `tasks` are kept from the existing document, if any. A task holding a
/// sample JSON can't represent is left out instead of failing the dump.
pub fn dump<'a>(
    store: &mut dyn Persistence,
    locator: &str,
    tasks: impl IntoIterator<Item = &'a Task>,
) -> Result<Dump, PersistenceError> {
    let mut document = match read(store, locator) {
        Ok(document) => document,
        Err(PersistenceError::NotFound(_)) => Document::default(),
        Err(err) => return Err(err),
    };

    let mut dump = Dump::default();
    for task in tasks {
        let invalid = task
            .data_sets()
            .iter()
            .enumerate()
            .find_map(|(set, data)| data.first_invalid().map(|index| (set, index)));

        if let Some((set, index)) = invalid {
            dump.rejected.push(PersistenceError::InvalidSample {
                task: task.name().to_string(),
                set,
                index,
            });
            continue;
        }

        let saved = document.data.entry(task.name().to_string()).or_default();
        saved.title = task.title().to_string();
        saved.data_sets = task.data_sets().to_vec();
        dump.written.push(task.name().to_string());
    }

    document.metadata = Metadata::current(dump.written.clone(), document.metadata);

    let value = serde_json::to_value(&document)
        .map_err(|err| PersistenceError::Format(locator.to_string(), err))?;
    store.write_json(locator, &value)?;

    tracing::debug!(
        locator,
        tasks = dump.written.len(),
        rejected = dump.rejected.len(),
        "dumped data sets"
    );
    Ok(dump)
}

use std::fs;
use std::io::ErrorKind;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;

use crate::error::PersistenceError;
use crate::host::Persistence;

/// JSON documents stored as files, locators resolved against `root`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Utf8PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, locator: &str) -> Utf8PathBuf {
        let path = Utf8Path::new(locator);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Persistence for FileStore {
    fn read_json(&self, locator: &str) -> Result<Value, PersistenceError> {
        let path = self.resolve(locator);
        let text = fs::read_to_string(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => PersistenceError::NotFound(path.to_string()),
            _ => PersistenceError::Io(path.to_string(), err),
        })?;

        serde_json::from_str(&text).map_err(|err| PersistenceError::Format(path.to_string(), err))
    }

    fn write_json(&mut self, locator: &str, value: &Value) -> Result<(), PersistenceError> {
        let path = self.resolve(locator);

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|err| PersistenceError::Io(path.to_string(), err))?;
        }

        let text = serde_json::to_string_pretty(value)
            .map_err(|err| PersistenceError::Format(path.to_string(), err))?;

        fs::write(&path, text).map_err(|err| PersistenceError::Io(path.to_string(), err))
    }

    fn size(&self, locator: &str) -> Option<u64> {
        fs::metadata(self.resolve(locator))
            .ok()
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
    }
}

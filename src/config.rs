use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, RegistrationError};

/// Default minimum size, in bytes, of a file accepted as a data source.
pub const MIN_FILE_SIZE: u64 = 16;

/// Overrides for a single view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    /// Title passed to the host, translated when unset.
    pub title: Option<String>,
    /// Kind of view to create, `graph` when unset.
    pub kind: Option<String>,
}

/// Options for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct EngineConfig {
    pub title: String,
    pub min_file_size: u64,
    /// Document read by tasks with `loadCompare` set.
    pub compare_file: Option<String>,
    /// Document written by the dump hook.
    pub dump_file: Option<String>,
    /// Tasks to dump, `*` for every valid one.
    pub dump: Vec<String>,
    pub views: BTreeMap<String, ViewConfig>,
    pub print_once: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: String::from("taskview"),
            min_file_size: MIN_FILE_SIZE,
            compare_file: None,
            dump_file: None,
            dump: Vec::new(),
            views: BTreeMap::new(),
            print_once: false,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| ConfigError::Read(path.into(), err))?;
        serde_json::from_str(&text).map_err(|err| ConfigError::Parse(path.into(), err))
    }

    pub fn view(&self, name: &str) -> ViewConfig {
        self.views.get(name).cloned().unwrap_or_default()
    }

    pub(crate) fn dumps(&self, task: &str) -> bool {
        self.dump.iter().any(|name| name == "*" || name == task)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub value: f64,
    pub color: u32,
}

/// Configuration record a task is built from.
///
/// Keys the engine doesn't know are kept in `unknown` only long enough to be
/// reported, they never reach the task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskConfig {
    pub name: String,
    pub title: Option<String>,
    /// Name of the input holding the data source reference.
    pub source: Option<String>,
    /// Required tasks, a leading `!` requires the task to be invalid.
    pub dependencies: Vec<String>,
    /// Tasks of which at least one must be valid.
    pub soft_dependencies: Vec<String>,
    /// View targets, e.g. `overview:1, detail:2`.
    pub view: Option<String>,
    pub background: bool,
    pub multicolor: bool,
    pub hidden: bool,
    pub load_compare: bool,
    pub dump: bool,
    pub graphic_type: u8,
    pub colors: Vec<u32>,
    pub axis_label: Option<String>,
    pub limits: Option<[f64; 2]>,
    pub scale: Option<Scale>,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, Value>,
}

impl TaskConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parses a JSON record.
    pub fn from_json(value: Value) -> Result<Self, RegistrationError> {
        serde_json::from_value(value).map_err(|err| RegistrationError::Config(err.to_string()))
    }

    /// Splits off the keys that were not recognised.
    pub(crate) fn take_unknown(&mut self) -> Vec<String> {
        std::mem::take(&mut self.unknown).into_keys().collect()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn source(mut self, input: impl Into<String>) -> Self {
        self.source = Some(input.into());
        self
    }

    pub fn depends_on(mut self, task: impl Into<String>) -> Self {
        self.dependencies.push(task.into());
        self
    }

    /// Requires `task` to be invalid, unregistered or not yet run.
    pub fn excludes(mut self, task: impl AsRef<str>) -> Self {
        self.dependencies.push(format!("!{}", task.as_ref()));
        self
    }

    pub fn depends_on_any<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.soft_dependencies
            .extend(tasks.into_iter().map(Into::into));
        self
    }

    pub fn view(mut self, targets: impl Into<String>) -> Self {
        self.view = Some(targets.into());
        self
    }

    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    pub fn multicolor(mut self) -> Self {
        self.multicolor = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn load_compare(mut self) -> Self {
        self.load_compare = true;
        self
    }

    pub fn dump(mut self) -> Self {
        self.dump = true;
        self
    }

    pub fn graphic_type(mut self, code: u8) -> Self {
        self.graphic_type = code;
        self
    }

    pub fn colors(mut self, colors: impl IntoIterator<Item = u32>) -> Self {
        self.colors = colors.into_iter().collect();
        self
    }

    pub fn axis_label(mut self, label: impl Into<String>) -> Self {
        self.axis_label = Some(label.into());
        self
    }

    pub fn limits(mut self, min: f64, max: f64) -> Self {
        self.limits = Some([min, max]);
        self
    }

    pub fn scale(mut self, value: f64, color: u32) -> Self {
        self.scale = Some(Scale { value, color });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_config_from_json() {
        let mut config = TaskConfig::from_json(json!({
            "name": "rms",
            "dependencies": ["raw", "!fallback"],
            "softDependencies": ["a", "b"],
            "view": "overview:1",
            "graphicType": 4,
            "colour": 3,
            "priority": "high",
        }))
        .unwrap();

        assert_eq!(config.name, "rms");
        assert_eq!(config.dependencies, vec!["raw", "!fallback"]);
        assert_eq!(config.soft_dependencies, vec!["a", "b"]);
        assert_eq!(config.graphic_type, 4);
        assert_eq!(config.take_unknown(), vec!["colour", "priority"]);
        assert!(config.unknown.is_empty());
    }

    #[test]
    fn test_task_config_wrong_type() {
        let err = TaskConfig::from_json(json!({"name": "a", "dependencies": "b"})).unwrap_err();
        assert!(matches!(err, RegistrationError::Config(_)));
    }

    #[test]
    fn test_builder_matches_json() {
        let built = TaskConfig::new("b")
            .depends_on("a")
            .excludes("c")
            .view("plot:2");
        let parsed = TaskConfig::from_json(json!({
            "name": "b",
            "dependencies": ["a", "!c"],
            "view": "plot:2",
        }))
        .unwrap();

        assert_eq!(built, parsed);
    }

    #[test]
    fn test_engine_config_defaults_and_dump_selection() {
        let config: EngineConfig =
            serde_json::from_value(json!({"dump": ["a"], "minFileSize": 4})).unwrap();
        assert_eq!(config.min_file_size, 4);
        assert!(config.dumps("a"));
        assert!(!config.dumps("b"));
        assert_eq!(config.view("plot"), ViewConfig::default());

        let all = EngineConfig {
            dump: vec!["*".into()],
            ..Default::default()
        };
        assert!(all.dumps("anything"));
    }

    #[test]
    fn test_engine_config_rejects_unknown_keys() {
        assert!(serde_json::from_value::<EngineConfig>(json!({"verbose": true})).is_err());
    }

    #[test]
    fn test_engine_config_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("engine.json")).unwrap();
        fs::write(&path, r#"{"title": "Report", "compareFile": "old.json"}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.title, "Report");
        assert_eq!(config.compare_file.as_deref(), Some("old.json"));

        let missing = EngineConfig::load(path.with_file_name("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Read(..))));
    }
}

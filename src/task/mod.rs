//! The per-task state machine.
//!
//! A task goes through four stages in a fixed order: data source check,
//! dependency check, compute, and join. Each stage appends one boolean to
//! the status history. The first stage that fails ends processing for that
//! task, so a `false` is never followed by a `true`.
mod data;
mod target;

use std::fmt::{Debug, Display};
use std::panic::{AssertUnwindSafe, catch_unwind};

pub use crate::task::data::{DataSet, Style};
pub use crate::task::target::{ViewTarget, parse_targets};

use crate::config::{EngineConfig, TaskConfig};
use crate::engine::{Graphics, RegistryView};
use crate::error::{ComputeError, PersistenceError, StageError, TaskFailure, ValidationError};
use crate::host::{Host, InputValue, Inputs, Persistence, Progress};
use crate::message::{Category, Message, MessageCollector};
use crate::task::data::emit_points;
use crate::view::{Arg, Instruction, PropertyKind, ViewProperties};
use crate::{TaskResult, gate, persist};

/// Line colours cycled through when a task doesn't configure its own.
pub const PALETTE: [u32; 6] = [0x1f77b4, 0xff7f0e, 0x2ca02c, 0xd62728, 0x9467bd, 0x8c564b];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DataSource,
    Dependencies,
    Compute,
    Join,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::DataSource,
        Stage::Dependencies,
        Stage::Compute,
        Stage::Join,
    ];
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::DataSource => "data source check",
            Stage::Dependencies => "dependency check",
            Stage::Compute => "compute",
            Stage::Join => "join",
        })
    }
}

/// What the data source of a task turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceType {
    Channel,
    File,
    #[default]
    None,
}

/// Outcome a compute step may return. `Inferred` leaves the decision to
/// whether any data sets were pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    #[default]
    Inferred,
    Valid,
    Invalid,
}

impl From<()> for Verdict {
    fn from(_: ()) -> Self {
        Verdict::Inferred
    }
}

impl From<bool> for Verdict {
    fn from(value: bool) -> Self {
        match value {
            true => Verdict::Valid,
            false => Verdict::Invalid,
        }
    }
}

type ComputeFn = Box<dyn Fn(&mut Compute<'_>) -> TaskResult<Verdict>>;

/// Everything a compute step can see and change.
pub struct Compute<'a> {
    name: &'a str,
    config: &'a TaskConfig,
    source: Option<&'a InputValue>,
    source_type: SourceType,
    inputs: &'a dyn Inputs,
    progress: &'a dyn Progress,
    tasks: RegistryView<'a>,
    data_sets: &'a mut Vec<DataSet>,
    requests: &'a mut ViewProperties,
}

impl<'a> Compute<'a> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn config(&self) -> &TaskConfig {
        self.config
    }

    /// Resolved value of the task's data source input.
    pub fn source(&self) -> Option<&InputValue> {
        self.source
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn input(&self, name: &str) -> Option<InputValue> {
        self.inputs.value(name)
    }

    /// A task registered and processed before this one.
    pub fn task(&self, name: &str) -> Option<&'a Task> {
        self.tasks.get(name)
    }

    pub fn valid_task(&self, name: &str) -> Option<&'a Task> {
        self.tasks.get_valid(name)
    }

    pub fn push(&mut self, set: DataSet) {
        self.data_sets.push(set);
    }

    pub fn data_sets(&self) -> &[DataSet] {
        self.data_sets
    }

    /// Adds a view instruction of any kind, e.g. `limits` or a host
    /// specific call. Graphics are added by the join stage.
    pub fn request(&mut self, view: &str, kind: &str, args: Vec<Arg>) {
        let kind = kind.parse().unwrap_or_else(|never| match never {});
        self.requests.push(view, kind, Instruction::new(args));
    }

    pub fn can_continue(&self) -> bool {
        self.progress.can_continue()
    }
}

/// What a task needs from the engine while it is processed.
pub(crate) struct Stages<'a> {
    pub tasks: RegistryView<'a>,
    pub host: &'a mut Host,
    pub graphics: &'a mut Graphics,
    pub messages: &'a mut MessageCollector,
    pub config: &'a EngineConfig,
}

pub struct Task {
    name: String,
    config: TaskConfig,
    targets: Vec<ViewTarget>,
    compute: ComputeFn,
    history: Vec<bool>,
    source: Option<InputValue>,
    source_type: SourceType,
    data_sets: Vec<DataSet>,
    requests: ViewProperties,
    failure: Option<TaskFailure>,
}

impl Task {
    pub fn new<F>(mut config: TaskConfig, compute: F) -> Self
    where
        F: Fn(&mut Compute<'_>) -> TaskResult<Verdict> + 'static,
    {
        config.name = config.name.trim().to_string();
        let targets = config.view.as_deref().map(parse_targets).unwrap_or_default();

        Self {
            name: config.name.clone(),
            config,
            targets,
            compute: Box::new(compute),
            history: Vec::new(),
            source: None,
            source_type: SourceType::None,
            data_sets: Vec::new(),
            requests: ViewProperties::new(),
            failure: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        self.config.title.as_deref().unwrap_or(&self.name)
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Outcome of every stage run so far.
    pub fn history(&self) -> &[bool] {
        &self.history
    }

    /// Last appended status, `None` if the task has not run.
    pub fn status(&self) -> Option<bool> {
        self.history.last().copied()
    }

    pub fn is_valid(&self) -> bool {
        self.status() == Some(true)
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn targets(&self) -> &[ViewTarget] {
        &self.targets
    }

    pub fn data_sets(&self) -> &[DataSet] {
        &self.data_sets
    }

    pub fn view_properties(&self) -> &ViewProperties {
        &self.requests
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        self.failure.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn push_data_set(&mut self, set: DataSet) {
        self.data_sets.push(set);
    }

    /// Runs every stage in order until one fails. Returns the final status.
    pub(crate) fn process(&mut self, cx: &mut Stages<'_>) -> bool {
        let span = tracing::info_span!("task", name = %self.name);
        let _enter = span.enter();

        for stage in Stage::ALL {
            let result = match stage {
                Stage::DataSource => self.check_source(cx).map_err(StageError::from),
                Stage::Dependencies => gate::check(
                    &self.config.dependencies,
                    &self.config.soft_dependencies,
                    &cx.tasks,
                )
                .map_err(StageError::from),
                Stage::Compute => self.compute(cx),
                // Tasks that don't draw have nothing to join.
                Stage::Join if self.config.view.is_none() => continue,
                Stage::Join => self.join(cx),
            };

            match result {
                Ok(()) => self.history.push(true),
                Err(error) => {
                    self.history.push(false);
                    self.fail(stage, error, cx.messages);
                    return false;
                }
            }
        }

        tracing::debug!("task is valid");
        true
    }

    fn fail(&mut self, stage: Stage, error: StageError, messages: &mut MessageCollector) {
        let failure = TaskFailure {
            task: self.name.clone(),
            stage,
            error,
        };

        if failure.error.is_fault() {
            tracing::warn!("{failure}");
            messages.add(
                Category::Error,
                Message::paragraph(format!("Task '{}' failed at {}", self.name, stage))
                    .with_detail(failure.error.to_string()),
            );
        } else {
            tracing::debug!("{failure}");
            messages.add(Category::Hint, Message::line(failure.to_string()).once());
        }

        self.failure = Some(failure);
    }

    fn check_source(&mut self, cx: &mut Stages<'_>) -> Result<(), ValidationError> {
        let Some(input) = self.config.source.as_deref() else {
            return Ok(());
        };

        let inputs = cx.host.inputs.as_ref();
        if !inputs.is_known(input) {
            return Err(ValidationError::UnknownInput(input.to_string()));
        }

        let value = inputs.value(input);
        let raw = inputs.raw_value(input);
        let source_type = resolve_source(
            value.as_ref(),
            raw.as_ref(),
            inputs,
            cx.host.store.as_ref(),
            cx.config.min_file_size,
        );

        self.source = value;
        self.source_type = source_type;

        match source_type {
            SourceType::None => Err(ValidationError::InvalidSource(input.to_string())),
            _ => Ok(()),
        }
    }

    fn compute(&mut self, cx: &mut Stages<'_>) -> Result<(), StageError> {
        match self.source_type == SourceType::File || self.config.load_compare {
            true => self.load_stored(cx)?,
            false => self.call(cx)?,
        }

        // Tasks that draw check their samples while emitting points.
        if self.config.view.is_none() {
            self.check_samples()?;
        }

        Ok(())
    }

    fn call(&mut self, cx: &mut Stages<'_>) -> Result<(), StageError> {
        let verdict = {
            let mut compute = Compute {
                name: &self.name,
                config: &self.config,
                source: self.source.as_ref(),
                source_type: self.source_type,
                inputs: cx.host.inputs.as_ref(),
                progress: cx.host.progress.as_ref(),
                tasks: cx.tasks,
                data_sets: &mut self.data_sets,
                requests: &mut self.requests,
            };

            let func = &self.compute;
            match catch_unwind(AssertUnwindSafe(|| func(&mut compute))) {
                Ok(result) => result.map_err(ComputeError::Userland)?,
                Err(panic) => return Err(ComputeError::Panic(panic_message(panic)).into()),
            }
        };

        match verdict {
            Verdict::Valid => Ok(()),
            Verdict::Invalid => Err(ValidationError::Rejected.into()),
            Verdict::Inferred if self.data_sets.is_empty() => {
                Err(ValidationError::NoDataSets.into())
            }
            Verdict::Inferred => Ok(()),
        }
    }

    /// Loads data sets stored for this task instead of computing them.
    fn load_stored(&mut self, cx: &mut Stages<'_>) -> Result<(), StageError> {
        let locator = match self.source_type {
            SourceType::File => self.source.as_ref().and_then(InputValue::as_text),
            _ => cx.config.compare_file.as_deref(),
        }
        .ok_or(PersistenceError::NoLocator("stored data sets"))
        .map_err(ComputeError::Load)?;

        let sets = persist::load_data_sets(cx.host.store.as_ref(), locator, &self.name)
            .map_err(ComputeError::Load)?;

        tracing::debug!(locator, count = sets.len(), "loaded stored data sets");
        self.data_sets.extend(sets);

        match self.data_sets.is_empty() {
            true => Err(ValidationError::NoDataSets.into()),
            false => Ok(()),
        }
    }

    fn check_samples(&self) -> Result<(), ValidationError> {
        let invalid = self
            .data_sets
            .iter()
            .enumerate()
            .find_map(|(set, data)| data.first_invalid().map(|index| (set, index)));

        match invalid {
            Some((set, index)) => Err(ValidationError::InvalidSample { set, index }),
            None => Ok(()),
        }
    }

    /// Draws every data set with samples and records the view requests.
    fn join(&mut self, cx: &mut Stages<'_>) -> Result<(), StageError> {
        if self.targets.is_empty() {
            let text = self.config.view.clone().unwrap_or_default();
            return Err(ValidationError::NoViewTarget(text).into());
        }

        if self.data_sets.iter().all(|set| set.y.is_empty()) {
            return Err(ValidationError::NoDataSets.into());
        }

        let config = &self.config;
        let axis_label = config.axis_label.as_deref().unwrap_or_default();
        let mut requests = ViewProperties::new();

        for (i, set) in self.data_sets.iter().enumerate() {
            if set.y.is_empty() {
                continue;
            }

            let style = Style::resolve(
                set.graphic_type.unwrap_or(config.graphic_type),
                config.background,
                config.multicolor,
            );
            let color = color_for(&config.colors, i);
            let name = set.label.as_deref().unwrap_or(self.title());

            let mut graphic = cx
                .host
                .visualization
                .create_graphic(name, axis_label, color)
                .map_err(ComputeError::Graphic)?;

            emit_points(graphic.as_mut(), set, i, &style, cx.host.progress.as_ref())?;

            if let Some([min, max]) = set.limits {
                graphic.set_limits(min, max);
            }

            if let Some(scale) = config.scale {
                graphic.set_scale(scale.value, scale.color);
            }

            let id = cx.graphics.push(graphic);

            for target in &self.targets {
                let args = vec![
                    Arg::Graphic(id),
                    Arg::Int(style.code.into()),
                    Arg::Int(color.into()),
                ];
                requests.push(
                    &target.view,
                    style.kind.clone(),
                    Instruction::keyed(id, target.slot, args),
                );

                if set.hidden || config.hidden {
                    requests.push(
                        &target.view,
                        PropertyKind::Set,
                        Instruction::new(vec![Arg::Graphic(id), Arg::Bool(false)]),
                    );
                }
            }
        }

        if let Some([min, max]) = config.limits {
            for target in &self.targets {
                requests.push(
                    &target.view,
                    PropertyKind::Limits,
                    Instruction::new(vec![Arg::Number(min), Arg::Number(max)]),
                );
            }
        }

        self.requests.merge(requests);
        Ok(())
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({}, {:?})", self.name, self.history)
    }
}

/// Decides what a data source input refers to. A value entered as-is is
/// tried as a single channel first, then as a list of channels, and last as
/// a file that exists and holds at least `min_file_size` bytes.
pub(crate) fn resolve_source(
    value: Option<&InputValue>,
    raw: Option<&InputValue>,
    inputs: &dyn Inputs,
    store: &dyn Persistence,
    min_file_size: u64,
) -> SourceType {
    let Some(value) = value else {
        return SourceType::None;
    };

    let single_channel = || match value {
        InputValue::Text(name) => inputs.has_channel(name),
        _ => false,
    };

    let channel_list = || match value {
        InputValue::List(names) => {
            !names.is_empty() && names.iter().all(|name| inputs.has_channel(name))
        }
        _ => false,
    };

    let file = || match value {
        InputValue::Text(path) => store.size(path).is_some_and(|size| size >= min_file_size),
        _ => false,
    };

    if (Some(value) == raw && single_channel()) || channel_list() {
        SourceType::Channel
    } else if file() {
        SourceType::File
    } else {
        SourceType::None
    }
}

fn color_for(colors: &[u32], index: usize) -> u32 {
    match colors {
        [] => PALETTE[index % PALETTE.len()],
        colors => colors[index % colors.len()],
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryStore, StaticInputs};
    use serde_json::json;

    #[test]
    fn test_resolve_single_channel() {
        let inputs = StaticInputs::new().set("in", "speed").channel("speed");
        let store = MemoryStore::new();
        let value = inputs.value("in");
        let raw = inputs.raw_value("in");

        assert_eq!(
            resolve_source(value.as_ref(), raw.as_ref(), &inputs, &store, 16),
            SourceType::Channel
        );
    }

    #[test]
    fn test_resolved_value_is_not_tried_as_single_channel() {
        let inputs = StaticInputs::new()
            .set_resolved("in", "$default", "speed")
            .channel("speed");
        let store = MemoryStore::new();
        let value = inputs.value("in");
        let raw = inputs.raw_value("in");

        assert_eq!(
            resolve_source(value.as_ref(), raw.as_ref(), &inputs, &store, 16),
            SourceType::None
        );
    }

    #[test]
    fn test_resolve_channel_list_and_file() {
        let inputs = StaticInputs::new()
            .set("list", vec!["a", "b"])
            .set("partial", vec!["a", "missing"])
            .set("file", "old.json")
            .set("tiny", "tiny.json")
            .channel("a")
            .channel("b");

        let store = MemoryStore::new();
        store.insert("old.json", json!({"data": {"task": {"dataSets": []}}}));
        store.insert("tiny.json", json!({}));

        let resolve = |name: &str| {
            let value = inputs.value(name);
            let raw = inputs.raw_value(name);
            resolve_source(value.as_ref(), raw.as_ref(), &inputs, &store, 16)
        };

        assert_eq!(resolve("list"), SourceType::Channel);
        assert_eq!(resolve("partial"), SourceType::None);
        assert_eq!(resolve("file"), SourceType::File);
        assert_eq!(resolve("tiny"), SourceType::None);
    }

    #[test]
    fn test_verdict_conversions() {
        assert_eq!(Verdict::from(()), Verdict::Inferred);
        assert_eq!(Verdict::from(true), Verdict::Valid);
        assert_eq!(Verdict::from(false), Verdict::Invalid);
    }

    #[test]
    fn test_color_for_cycles() {
        assert_eq!(color_for(&[], 0), PALETTE[0]);
        assert_eq!(color_for(&[], PALETTE.len()), PALETTE[0]);
        assert_eq!(color_for(&[1, 2], 3), 2);
    }

    #[test]
    fn test_targets_parsed_on_creation() {
        let task = Task::new(TaskConfig::new(" a ").view("plot:1, :3"), |_| Ok(().into()));
        assert_eq!(task.name(), "a");
        assert_eq!(task.targets(), &[ViewTarget::new("plot", 0)]);
        assert_eq!(task.status(), None);
    }
}

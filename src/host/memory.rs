//! In-memory collaborators. They run the engine headless and keep a record of
//! everything that was drawn, stored or printed.
use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use anyhow::bail;
use serde_json::Value;

use crate::error::PersistenceError;
use crate::host::{
    CallArg, CancelToken, Graphic, InputValue, Inputs, Persistence, Progress, Report, Translate,
    View, Visualization,
};

/// A view call as seen by the host, arguments rendered to text.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub view: String,
    pub method: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphicRecord {
    pub name: String,
    pub axis_label: String,
    pub color: u32,
    pub points: Vec<(f64, f64)>,
    pub point_colors: Vec<f64>,
    pub limits: Option<(f64, f64)>,
    pub scale: Option<(f64, u32)>,
}

#[derive(Debug, Default)]
pub struct RecordLog {
    /// Created views as `(title, kind)`, in creation order.
    pub views: Vec<(String, String)>,
    pub graphics: Vec<GraphicRecord>,
    pub calls: Vec<Call>,
    pub commits: Vec<String>,
    failing: HashSet<String>,
}

/// Visualization that records every call instead of drawing.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: Rc<RefCell<RecordLog>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every view call to `method` fail.
    pub fn fail_on(self, method: &str) -> Self {
        self.log.borrow_mut().failing.insert(method.to_string());
        self
    }

    pub fn log(&self) -> Ref<'_, RecordLog> {
        self.log.borrow()
    }

    pub fn view_titles(&self) -> Vec<String> {
        self.log().views.iter().map(|(title, _)| title.clone()).collect()
    }

    pub fn calls_for(&self, view: &str) -> Vec<Call> {
        self.log()
            .calls
            .iter()
            .filter(|call| call.view == view)
            .cloned()
            .collect()
    }

    pub fn graphic(&self, name: &str) -> Option<GraphicRecord> {
        self.log()
            .graphics
            .iter()
            .find(|graphic| graphic.name == name)
            .cloned()
    }
}

impl Visualization for Recorder {
    fn create_view(&mut self, title: &str, kind: &str) -> anyhow::Result<Box<dyn View>> {
        self.log
            .borrow_mut()
            .views
            .push((title.to_string(), kind.to_string()));

        Ok(Box::new(RecordedView {
            title: title.to_string(),
            log: self.log.clone(),
        }))
    }

    fn create_graphic(
        &mut self,
        name: &str,
        axis_label: &str,
        color: u32,
    ) -> anyhow::Result<Box<dyn Graphic>> {
        let mut log = self.log.borrow_mut();
        log.graphics.push(GraphicRecord {
            name: name.to_string(),
            axis_label: axis_label.to_string(),
            color,
            ..Default::default()
        });

        Ok(Box::new(RecordedGraphic {
            name: name.to_string(),
            index: log.graphics.len() - 1,
            log: self.log.clone(),
        }))
    }
}

struct RecordedView {
    title: String,
    log: Rc<RefCell<RecordLog>>,
}

impl View for RecordedView {
    fn apply(&mut self, method: &str, args: &[CallArg<'_>]) -> anyhow::Result<()> {
        let mut log = self.log.borrow_mut();
        if log.failing.contains(method) {
            bail!("{method} is not supported by this view");
        }

        let args = args
            .iter()
            .map(|arg| match arg {
                CallArg::Graphic(graphic) => graphic.name().to_string(),
                CallArg::Text(text) => text.to_string(),
                other => format!("{other:?}"),
            })
            .collect();

        log.calls.push(Call {
            view: self.title.clone(),
            method: method.to_string(),
            args,
        });

        Ok(())
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        self.log.borrow_mut().commits.push(self.title.clone());
        Ok(())
    }
}

struct RecordedGraphic {
    name: String,
    index: usize,
    log: Rc<RefCell<RecordLog>>,
}

impl RecordedGraphic {
    fn with(&self, f: impl FnOnce(&mut GraphicRecord)) {
        f(&mut self.log.borrow_mut().graphics[self.index]);
    }
}

impl Graphic for RecordedGraphic {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_point(&mut self, x: f64, y: f64) {
        self.with(|record| record.points.push((x, y)));
    }

    fn add_color_point(&mut self, x: f64, y: f64, color: f64) {
        self.with(|record| {
            record.points.push((x, y));
            record.point_colors.push(color);
        });
    }

    fn set_limits(&mut self, min: f64, max: f64) {
        self.with(|record| record.limits = Some((min, max)));
    }

    fn set_scale(&mut self, value: f64, color: u32) {
        self.with(|record| record.scale = Some((value, color)));
    }
}

/// Fixed input values and channel names.
#[derive(Debug, Clone, Default)]
pub struct StaticInputs {
    values: HashMap<String, InputValue>,
    raw: HashMap<String, InputValue>,
    channels: HashSet<String>,
}

impl StaticInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an input whose resolved value equals the entered one.
    pub fn set(mut self, name: &str, value: impl Into<InputValue>) -> Self {
        let value = value.into();
        self.raw.insert(name.to_string(), value.clone());
        self.values.insert(name.to_string(), value);
        self
    }

    /// Sets an input entered as `raw` that resolves to `value`.
    pub fn set_resolved(
        mut self,
        name: &str,
        raw: impl Into<InputValue>,
        value: impl Into<InputValue>,
    ) -> Self {
        self.raw.insert(name.to_string(), raw.into());
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn channel(mut self, name: &str) -> Self {
        self.channels.insert(name.to_string());
        self
    }
}

impl Inputs for StaticInputs {
    fn value(&self, name: &str) -> Option<InputValue> {
        self.values.get(name).cloned()
    }

    fn raw_value(&self, name: &str) -> Option<InputValue> {
        self.raw.get(name).cloned()
    }

    fn is_known(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn has_channel(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }
}

/// Key to text lookup. Unknown keys translate to themselves.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The texts the built-in hooks and the message printer ask for.
    pub fn english() -> Self {
        Self::new()
            .insert("messages.error", "Errors")
            .insert("messages.warning", "Warnings")
            .insert("messages.hint", "Hints")
            .insert("summary.tasks", "{0} of {1} tasks valid")
            .insert("summary.time", "Finished in {0}")
            .insert("status.start", "Running {0}")
            .insert("status.task", "Processing {0}")
            .insert("status.views", "Building views")
            .insert("status.done", "Done")
            .insert("status.cancelled", "Cancelled")
    }

    pub fn insert(mut self, key: &str, text: &str) -> Self {
        self.entries.insert(key.to_string(), text.to_string());
        self
    }
}

impl Translate for Catalog {
    fn translate(&self, key: &str, args: &[&str]) -> String {
        let mut text = self
            .entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string());

        for (i, arg) in args.iter().enumerate() {
            text = text.replace(&format!("{{{i}}}"), arg);
        }

        text
    }
}

/// Documents kept in memory, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Rc<RefCell<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, locator: &str, value: Value) {
        self.documents
            .borrow_mut()
            .insert(locator.to_string(), value);
    }

    pub fn get(&self, locator: &str) -> Option<Value> {
        self.documents.borrow().get(locator).cloned()
    }
}

impl Persistence for MemoryStore {
    fn read_json(&self, locator: &str) -> Result<Value, PersistenceError> {
        self.get(locator)
            .ok_or_else(|| PersistenceError::NotFound(locator.to_string()))
    }

    fn write_json(&mut self, locator: &str, value: &Value) -> Result<(), PersistenceError> {
        self.insert(locator, value.clone());
        Ok(())
    }

    fn size(&self, locator: &str) -> Option<u64> {
        self.get(locator).map(|value| value.to_string().len() as u64)
    }
}

/// Progress sink that only honours cancellation.
#[derive(Debug, Clone, Default)]
pub struct Quiet {
    token: CancelToken,
}

impl Quiet {
    pub fn new(token: CancelToken) -> Self {
        Self { token }
    }
}

impl Progress for Quiet {
    fn can_continue(&self) -> bool {
        !self.token.is_cancelled()
    }

    fn set_progress(&self, _: u64) {}

    fn set_status_text(&self, _: &str) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Printed {
    Header(String),
    Line(String),
    Paragraph(String),
}

#[derive(Debug, Default)]
pub struct ReportLog {
    pub printed: Vec<Printed>,
    pub shown: bool,
}

/// Report surface buffering everything printed to it.
#[derive(Debug, Clone, Default)]
pub struct BufferReport {
    log: Rc<RefCell<ReportLog>>,
}

impl BufferReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Ref<'_, ReportLog> {
        self.log.borrow()
    }

    /// Printed text without distinguishing headers from messages.
    pub fn lines(&self) -> Vec<String> {
        self.log()
            .printed
            .iter()
            .map(|printed| match printed {
                Printed::Header(text) | Printed::Line(text) | Printed::Paragraph(text) => {
                    text.clone()
                }
            })
            .collect()
    }

    pub fn was_shown(&self) -> bool {
        self.log().shown
    }
}

impl Report for BufferReport {
    fn header(&mut self, text: &str) {
        self.log
            .borrow_mut()
            .printed
            .push(Printed::Header(text.to_string()));
    }

    fn line(&mut self, text: &str) {
        self.log
            .borrow_mut()
            .printed
            .push(Printed::Line(text.to_string()));
    }

    fn paragraph(&mut self, text: &str) {
        self.log
            .borrow_mut()
            .printed
            .push(Printed::Paragraph(text.to_string()));
    }

    fn show(&mut self) {
        self.log.borrow_mut().shown = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_substitutes_arguments() {
        let catalog = Catalog::new().insert("summary", "{0} of {1} tasks valid");
        assert_eq!(catalog.translate("summary", &["2", "3"]), "2 of 3 tasks valid");
        assert_eq!(catalog.translate("missing", &["x"]), "missing");
    }

    #[test]
    fn test_recorder_failing_method() {
        let mut recorder = Recorder::new().fail_on("setLimits");
        let mut view = recorder.create_view("plot", "graph").unwrap();

        assert!(view.apply("setLimits", &[CallArg::Number(0.0)]).is_err());
        assert!(view.apply("addArea", &[CallArg::Int(1)]).is_ok());
        assert_eq!(recorder.calls_for("plot").len(), 1);
    }

    #[test]
    fn test_memory_store_shared_between_clones() {
        let store = MemoryStore::new();
        let mut other = store.clone();
        other
            .write_json("dump", &serde_json::json!({"data": {}}))
            .unwrap();

        assert!(store.get("dump").is_some());
        assert!(matches!(
            store.read_json("missing"),
            Err(PersistenceError::NotFound(_))
        ));
    }
}

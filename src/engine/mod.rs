//! The dispatcher: owns the registry, the lifecycle hooks and everything a
//! run accumulates, and drives the three phases of a run.
mod builtin;
mod registry;
mod schedule;

use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value;

pub use crate::engine::registry::{GraphicId, Graphics, Registry, RegistryView};
pub use crate::engine::schedule::{Hook, Schedule};

use crate::config::{EngineConfig, TaskConfig};
use crate::error::{EngineError, RegistrationError, ScheduleError};
use crate::host::Host;
use crate::message::{Category, MessageCollector};
use crate::profiler::Profiler;
use crate::task::{Compute, Stages, Task, Verdict};
use crate::view::ViewProperties;
use crate::TaskResult;

/// Profiler key covering the whole run.
pub const RUN_KEY: &str = "run";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Idle,
    Running,
    Finished,
}

/// Everything one run accumulates.
#[derive(Debug, Default)]
pub struct RunContext {
    pub profiler: Profiler,
    pub messages: MessageCollector,
    pub graphics: Graphics,
    /// Merged view properties of every valid task.
    pub views: ViewProperties,
    /// Views created by the host, in creation order.
    pub created: Vec<String>,
    /// Tasks written by the dump hook.
    pub dumped: Vec<String>,
    pub cancelled: bool,
}

/// What a lifecycle hook gets to work with.
pub struct HookContext<'a> {
    pub config: &'a EngineConfig,
    pub tasks: &'a Registry,
    pub host: &'a mut Host,
    pub run: &'a mut RunContext,
}

/// Outcome of [`Engine::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Created views in creation order.
    pub views: Vec<String>,
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
    /// Tasks that never ran because the run was cancelled first.
    pub skipped: Vec<String>,
    pub cancelled: bool,
    pub errors: usize,
    /// `-1` when the run profiler was not started.
    pub elapsed_ms: i64,
}

pub struct Engine {
    config: EngineConfig,
    host: Host,
    registry: Registry,
    schedule: Schedule,
    run: RunContext,
    state: State,
}

impl Engine {
    /// An engine with the built-in hooks scheduled.
    pub fn new(config: EngineConfig, host: Host) -> Self {
        let mut schedule = Schedule::new();
        builtin::install(&mut schedule);

        Self {
            config,
            host,
            registry: Registry::new(),
            schedule,
            run: RunContext::default(),
            state: State::Idle,
        }
    }

    /// Adds a task built from `config`. A rejected task is reported and
    /// dropped, the engine stays usable.
    pub fn register<F>(
        &mut self,
        mut config: TaskConfig,
        compute: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&mut Compute<'_>) -> TaskResult<Verdict> + 'static,
    {
        let unknown = config.take_unknown();
        let task = Task::new(config, compute);
        let name = task.name().to_string();

        if let Err(err) = self.registry.insert(task) {
            tracing::warn!("{err}");
            self.run.messages.error(err.to_string());
            return Err(err);
        }

        for key in unknown {
            tracing::warn!(task = %name, key, "ignoring unknown option");
            self.run
                .messages
                .warning(format!("Task '{name}': unknown option '{key}' ignored"));
        }

        tracing::debug!(task = %name, "registered");
        Ok(())
    }

    /// Like [`Engine::register`], with the configuration given as JSON.
    pub fn register_json<F>(&mut self, config: Value, compute: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut Compute<'_>) -> TaskResult<Verdict> + 'static,
    {
        match TaskConfig::from_json(config) {
            Ok(config) => self.register(config, compute),
            Err(err) => {
                tracing::warn!("{err}");
                self.run.messages.error(err.to_string());
                Err(err)
            }
        }
    }

    pub fn register_hook<F>(&mut self, name: &str, hook: F) -> Result<(), ScheduleError>
    where
        F: FnMut(&mut HookContext<'_>) -> anyhow::Result<()> + 'static,
    {
        self.schedule.register(name, Box::new(hook))
    }

    pub fn schedule(
        &mut self,
        phase: Phase,
        priority: u32,
        name: &str,
    ) -> Result<(), ScheduleError> {
        self.schedule.schedule(phase, priority, name)
    }

    pub fn unschedule(&mut self, phase: Phase, name: &str) -> bool {
        self.schedule.unschedule(phase, name)
    }

    pub fn hooks(&self) -> &Schedule {
        &self.schedule
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.registry.get(name)
    }

    /// The task, only if it has run and its last status is `true`.
    pub fn valid_task(&self, name: &str) -> Option<&Task> {
        self.registry.get_valid(name)
    }

    /// Every task in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.registry.iter()
    }

    pub fn messages(&self) -> &MessageCollector {
        &self.run.messages
    }

    pub fn profiler(&self) -> &Profiler {
        &self.run.profiler
    }

    pub fn graphics(&self) -> &Graphics {
        &self.run.graphics
    }

    pub fn view_properties(&self) -> &ViewProperties {
        &self.run.views
    }

    /// Runs the pre-process hooks, every task in registration order, then
    /// the post-process hooks. Failures end up in [`Engine::messages`], only
    /// a repeated call is refused.
    pub fn run(&mut self) -> Result<RunReport, EngineError> {
        match self.state {
            State::Running => return Err(EngineError::AlreadyRunning),
            State::Finished => return Err(EngineError::AlreadyRan),
            State::Idle => self.state = State::Running,
        }

        let span = tracing::info_span!("run", title = %self.config.title);
        let _enter = span.enter();

        self.run_hooks(Phase::Pre);
        self.run_tasks();
        self.run_hooks(Phase::Post);

        self.state = State::Finished;

        let report = self.report();
        tracing::info!(
            valid = report.valid.len(),
            invalid = report.invalid.len(),
            views = report.views.len(),
            "run finished"
        );
        Ok(report)
    }

    fn run_hooks(&mut self, phase: Phase) {
        let Self {
            config,
            host,
            registry,
            schedule,
            run,
            ..
        } = self;

        for name in schedule.ordered(phase) {
            let Some(hook) = schedule.hook_mut(&name) else {
                tracing::debug!(?phase, hook = %name, "skipping unregistered hook");
                continue;
            };

            tracing::debug!(?phase, hook = %name, "running hook");
            let mut cx = HookContext {
                config: &*config,
                tasks: &*registry,
                host: &mut *host,
                run: &mut *run,
            };

            let result = match catch_unwind(AssertUnwindSafe(|| hook(&mut cx))) {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("hook panicked")),
            };

            if let Err(err) = result {
                tracing::error!(?phase, hook = %name, "{err:#}");
                run.messages.error(format!("Hook '{name}' failed: {err:#}"));
            }
        }
    }

    fn run_tasks(&mut self) {
        let total = self.registry.len();

        for i in 0..total {
            if !self.host.progress.can_continue() {
                self.cancel();
                break;
            }

            let (earlier, rest) = self.registry.tasks.split_at_mut(i);
            let task = &mut rest[0];

            let status = self
                .host
                .translate
                .translate("status.task", &[task.title()]);
            self.host.progress.set_status_text(&status);

            let key = format!("task:{}", task.name());
            self.run.profiler.start(key.as_str());

            let mut stages = Stages {
                tasks: RegistryView::new(earlier, &self.registry.index),
                host: &mut self.host,
                graphics: &mut self.run.graphics,
                messages: &mut self.run.messages,
                config: &self.config,
            };
            task.process(&mut stages);

            let ms = self.run.profiler.stop(&key);
            tracing::debug!(task = %task.name(), ms, valid = task.is_valid(), "processed");
            self.host.progress.set_progress(i as u64 + 1);
        }

        // A cancel during the last task still counts.
        if !self.run.cancelled && !self.host.progress.can_continue() {
            self.cancel();
        }
    }

    fn cancel(&mut self) {
        tracing::warn!("run cancelled");
        self.run.cancelled = true;
        let text = self.host.translate.translate("status.cancelled", &[]);
        self.run.messages.warning(text);
    }

    fn report(&self) -> RunReport {
        let mut report = RunReport {
            views: self.run.created.clone(),
            cancelled: self.run.cancelled,
            errors: self.run.messages.count(Category::Error),
            elapsed_ms: self.run.profiler.elapsed_ms(RUN_KEY),
            ..Default::default()
        };

        for task in self.registry.iter() {
            let name = task.name().to_string();
            match task.status() {
                Some(true) => report.valid.push(name),
                Some(false) => report.invalid.push(name),
                None => report.skipped.push(name),
            }
        }

        report
    }
}

impl Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Engine({}, {} tasks)", self.config.title, self.registry.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Recorder;

    #[test]
    fn test_second_run_is_refused() {
        let mut engine = Engine::new(EngineConfig::default(), Host::new(Recorder::new()));
        assert!(engine.run().is_ok());
        assert!(matches!(engine.run(), Err(EngineError::AlreadyRan)));
    }

    #[test]
    fn test_unknown_options_warn_but_register() {
        let mut engine = Engine::new(EngineConfig::default(), Host::new(Recorder::new()));
        engine
            .register_json(serde_json::json!({"name": "a", "colour": 1}), |_| Ok(().into()))
            .unwrap();

        assert!(engine.task("a").is_some());
        assert!(engine.task("a").unwrap().config().unknown.is_empty());
        assert_eq!(engine.messages().count(Category::Warning), 1);
    }

    #[test]
    fn test_failing_hook_is_reported() {
        let mut engine = Engine::new(EngineConfig::default(), Host::new(Recorder::new()));
        engine
            .register_hook("broken", |_| anyhow::bail!("no luck"))
            .unwrap();
        engine.schedule(Phase::Pre, 1, "broken").unwrap();

        let report = engine.run().unwrap();
        assert_eq!(report.errors, 1);
        assert!(engine.messages().messages(Category::Error)[0]
            .text
            .contains("no luck"));
    }
}

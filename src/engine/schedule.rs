use std::collections::HashMap;
use std::fmt::Debug;

use crate::engine::{HookContext, Phase};
use crate::error::ScheduleError;

/// A lifecycle hook, run once per phase it is scheduled for.
pub type Hook = Box<dyn FnMut(&mut HookContext<'_>) -> anyhow::Result<()>>;

struct Entry {
    priority: u32,
    name: String,
}

/// Named hooks and the order they run in for each phase.
#[derive(Default)]
pub struct Schedule {
    hooks: HashMap<String, Hook>,
    pre: Vec<Entry>,
    post: Vec<Entry>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, hook: Hook) -> Result<(), ScheduleError> {
        if self.hooks.contains_key(name) {
            return Err(ScheduleError::DuplicateHook(name.to_string()));
        }

        self.hooks.insert(name.to_string(), hook);
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Adds `name` to `phase`. Lower priorities run first, equal priorities
    /// run in the order they were scheduled.
    pub fn schedule(
        &mut self,
        phase: Phase,
        priority: u32,
        name: &str,
    ) -> Result<(), ScheduleError> {
        if !self.is_registered(name) {
            return Err(ScheduleError::UnknownHook {
                phase,
                name: name.to_string(),
            });
        }

        let entries = self.entries_mut(phase);
        if let Some(other) = entries.iter().find(|entry| entry.priority == priority) {
            tracing::warn!(
                ?phase,
                priority,
                hook = name,
                other = %other.name,
                "priority already taken, running after it"
            );
        }

        entries.push(Entry {
            priority,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Removes every entry of `name` from `phase`. Returns whether any was
    /// removed.
    pub fn unschedule(&mut self, phase: Phase, name: &str) -> bool {
        let entries = self.entries_mut(phase);
        let before = entries.len();
        entries.retain(|entry| entry.name != name);
        entries.len() != before
    }

    /// Hook names of `phase` in run order.
    pub fn ordered(&self, phase: Phase) -> Vec<String> {
        let mut entries: Vec<&Entry> = self.entries(phase).iter().collect();
        entries.sort_by_key(|entry| entry.priority);
        entries.into_iter().map(|entry| entry.name.clone()).collect()
    }

    pub(crate) fn hook_mut(&mut self, name: &str) -> Option<&mut Hook> {
        self.hooks.get_mut(name)
    }

    fn entries(&self, phase: Phase) -> &Vec<Entry> {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Post => &self.post,
        }
    }

    fn entries_mut(&mut self, phase: Phase) -> &mut Vec<Entry> {
        match phase {
            Phase::Pre => &mut self.pre,
            Phase::Post => &mut self.post,
        }
    }
}

impl Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("pre", &self.ordered(Phase::Pre))
            .field("post", &self.ordered(Phase::Post))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Hook {
        Box::new(|_| Ok(()))
    }

    #[test]
    fn test_ordered_by_priority_then_insertion() {
        let mut schedule = Schedule::new();
        for name in ["a", "b", "c", "d"] {
            schedule.register(name, noop()).unwrap();
        }

        schedule.schedule(Phase::Pre, 30, "a").unwrap();
        schedule.schedule(Phase::Pre, 10, "b").unwrap();
        schedule.schedule(Phase::Pre, 30, "c").unwrap();
        schedule.schedule(Phase::Pre, 20, "d").unwrap();
        schedule.schedule(Phase::Post, 5, "a").unwrap();

        assert_eq!(schedule.ordered(Phase::Pre), vec!["b", "d", "a", "c"]);
        assert_eq!(schedule.ordered(Phase::Post), vec!["a"]);
    }

    #[test]
    fn test_unknown_and_duplicate_hooks() {
        let mut schedule = Schedule::new();
        schedule.register("a", noop()).unwrap();

        assert_eq!(
            schedule.register("a", noop()),
            Err(ScheduleError::DuplicateHook("a".into()))
        );
        assert_eq!(
            schedule.schedule(Phase::Post, 1, "missing"),
            Err(ScheduleError::UnknownHook {
                phase: Phase::Post,
                name: "missing".into()
            })
        );
        assert!(schedule.ordered(Phase::Post).is_empty());
    }

    #[test]
    fn test_unschedule() {
        let mut schedule = Schedule::new();
        schedule.register("a", noop()).unwrap();
        schedule.schedule(Phase::Pre, 1, "a").unwrap();

        assert!(schedule.unschedule(Phase::Pre, "a"));
        assert!(!schedule.unschedule(Phase::Pre, "a"));
        assert!(schedule.ordered(Phase::Pre).is_empty());
        assert!(schedule.is_registered("a"));
    }
}

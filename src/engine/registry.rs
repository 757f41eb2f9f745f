use std::collections::HashMap;

use crate::error::RegistrationError;
use crate::gate::TaskLookup;
use crate::host::Graphic;
use crate::task::Task;

/// Tasks by name, iterated in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) tasks: Vec<Task>,
    pub(crate) index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `task` at the end. An existing task of the same name is kept and
    /// the new one rejected.
    pub fn insert(&mut self, task: Task) -> Result<(), RegistrationError> {
        if task.name().is_empty() {
            return Err(RegistrationError::InvalidName);
        }

        if self.index.contains_key(task.name()) {
            return Err(RegistrationError::DuplicateName(task.name().to_string()));
        }

        self.index.insert(task.name().to_string(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    /// The task, only if its current status is `true`.
    pub fn get_valid(&self, name: &str) -> Option<&Task> {
        self.get(name).filter(|task| task.is_valid())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskLookup for Registry {
    fn is_valid(&self, name: &str) -> bool {
        self.get_valid(name).is_some()
    }
}

/// The registry as seen from the task currently being processed: only the
/// tasks before it have run.
#[derive(Clone, Copy)]
pub struct RegistryView<'a> {
    earlier: &'a [Task],
    index: &'a HashMap<String, usize>,
}

impl<'a> RegistryView<'a> {
    pub(crate) fn new(earlier: &'a [Task], index: &'a HashMap<String, usize>) -> Self {
        Self { earlier, index }
    }

    /// A task that has already been processed.
    pub fn get(&self, name: &str) -> Option<&'a Task> {
        self.index
            .get(name)
            .and_then(|&i| self.earlier.get(i))
    }

    pub fn get_valid(&self, name: &str) -> Option<&'a Task> {
        self.get(name).filter(|task| task.is_valid())
    }
}

impl TaskLookup for RegistryView<'_> {
    fn is_valid(&self, name: &str) -> bool {
        self.get_valid(name).is_some()
    }
}

/// Index of a graphic in the [`Graphics`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GraphicId(pub usize);

/// Append-only arena of every graphic drawn during a run.
#[derive(Default)]
pub struct Graphics {
    items: Vec<Box<dyn Graphic>>,
}

impl Graphics {
    pub fn push(&mut self, graphic: Box<dyn Graphic>) -> GraphicId {
        self.items.push(graphic);
        GraphicId(self.items.len() - 1)
    }

    pub fn get(&self, id: GraphicId) -> Option<&dyn Graphic> {
        self.items.get(id.0).map(|graphic| graphic.as_ref())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl std::fmt::Debug for Graphics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Graphics({})", self.items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskConfig;

    fn task(name: &str) -> Task {
        Task::new(TaskConfig::new(name), |_| Ok(().into()))
    }

    #[test]
    fn test_duplicate_is_rejected_not_overwritten() {
        let mut registry = Registry::new();
        registry
            .insert(Task::new(TaskConfig::new("a").title("first"), |_| Ok(().into())))
            .unwrap();

        let err = registry
            .insert(Task::new(TaskConfig::new("a").title("second"), |_| Ok(().into())))
            .unwrap_err();

        assert_eq!(err, RegistrationError::DuplicateName("a".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().title(), "first");
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut registry = Registry::new();
        assert_eq!(registry.insert(task("  ")), Err(RegistrationError::InvalidName));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_view_hides_later_tasks() {
        let mut registry = Registry::new();
        registry.insert(task("a")).unwrap();
        registry.insert(task("b")).unwrap();

        let view = RegistryView::new(&registry.tasks[..1], &registry.index);
        assert!(view.get("a").is_some());
        assert!(view.get("b").is_none());
        assert!(registry.get("b").is_some());
    }
}

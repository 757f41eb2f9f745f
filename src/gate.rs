//! Dependency queries against tasks that have already finished.
//!
//! There is no dependency graph: a dependency counts as resolved only if the
//! named task exists and its last status is `true` at the moment of the
//! query. Tasks run in registration order, so a dependency registered after
//! its dependent is never resolved.
use crate::error::ValidationError;

/// Prefix marking a dependency that must not be valid.
pub const NEGATION: char = '!';

/// Answers whether a task is currently valid.
pub trait TaskLookup {
    /// `true` only if the task exists, has run, and its last status is
    /// `true`.
    fn is_valid(&self, name: &str) -> bool;
}

/// Splits a dependency into its task name and whether it is negated.
pub fn split_negation(dependency: &str) -> (&str, bool) {
    match dependency.strip_prefix(NEGATION) {
        Some(name) => (name.trim(), true),
        None => (dependency.trim(), false),
    }
}

/// Every non-negated dependency must be valid.
pub fn hard_satisfied(
    dependencies: &[String],
    lookup: &impl TaskLookup,
) -> Result<(), ValidationError> {
    dependencies
        .iter()
        .map(|dependency| split_negation(dependency))
        .filter(|(_, negated)| !negated)
        .try_for_each(|(name, _)| match lookup.is_valid(name) {
            true => Ok(()),
            false => Err(ValidationError::MissingDependency(name.to_string())),
        })
}

/// No negated dependency may be valid.
pub fn negated_satisfied(
    dependencies: &[String],
    lookup: &impl TaskLookup,
) -> Result<(), ValidationError> {
    dependencies
        .iter()
        .map(|dependency| split_negation(dependency))
        .filter(|(_, negated)| *negated)
        .try_for_each(|(name, _)| match lookup.is_valid(name) {
            true => Err(ValidationError::ExcludedDependency(name.to_string())),
            false => Ok(()),
        })
}

/// At least one soft dependency must be valid, trivially true when there
/// are none.
pub fn soft_satisfied(soft: &[String], lookup: &impl TaskLookup) -> Result<(), ValidationError> {
    if soft.is_empty() || soft.iter().any(|name| lookup.is_valid(name)) {
        Ok(())
    } else {
        Err(ValidationError::NoSoftDependency(soft.to_vec()))
    }
}

/// Runs the three checks in order and reports the first violation.
pub fn check(
    dependencies: &[String],
    soft: &[String],
    lookup: &impl TaskLookup,
) -> Result<(), ValidationError> {
    hard_satisfied(dependencies, lookup)?;
    negated_satisfied(dependencies, lookup)?;
    soft_satisfied(soft, lookup)
}

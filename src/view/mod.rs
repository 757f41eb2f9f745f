//! Merging of the view requests of every task into one set of draw
//! instructions per view.
//!
//! Tasks register their graphics in whatever order they happen to run, but
//! inside a view graphics have to be drawn in the order of the slots their
//! authors declared. Every sortable instruction therefore carries a
//! [`SortKey`] made of its global graphic index and its slot. Once all
//! requests are merged the instructions are sorted by slot, ties broken by
//! the global index, and the keys are stripped.
mod apply;

use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::str::FromStr;

pub(crate) use crate::view::apply::apply_view;
pub use crate::view::apply::MAX_ARGS;

use crate::engine::GraphicId;
use crate::task::ViewTarget;

/// Kind of a view property, each kind maps to one view call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Background fill.
    Area,
    /// Multicolor graphic.
    Graphic,
    /// Indexed line graphic.
    GraphicEx,
    /// Initial visibility of a graphic.
    Set,
    Limits,
    /// Passed through as a call of the same name.
    Other(String),
}

impl PropertyKind {
    pub fn as_str(&self) -> &str {
        match self {
            PropertyKind::Area => "area",
            PropertyKind::Graphic => "graphic",
            PropertyKind::GraphicEx => "graphicEx",
            PropertyKind::Set => "set",
            PropertyKind::Limits => "limits",
            PropertyKind::Other(name) => name,
        }
    }

    /// Whether instructions of this kind are put in draw order.
    pub fn is_sortable(&self) -> bool {
        matches!(
            self,
            PropertyKind::Area | PropertyKind::Graphic | PropertyKind::GraphicEx
        )
    }

    /// Name of the view call the kind translates to.
    pub fn method(&self) -> &str {
        match self {
            PropertyKind::Area => "addArea",
            PropertyKind::Graphic => "addGraphic",
            PropertyKind::GraphicEx => "addGraphicEx",
            PropertyKind::Set => "setGraphicVisibility",
            PropertyKind::Limits => "setLimits",
            PropertyKind::Other(name) => name,
        }
    }
}

impl FromStr for PropertyKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "area" => PropertyKind::Area,
            "graphic" => PropertyKind::Graphic,
            "graphicEx" => PropertyKind::GraphicEx,
            "set" => PropertyKind::Set,
            "limits" => PropertyKind::Limits,
            other => PropertyKind::Other(other.to_string()),
        })
    }
}

impl Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One positional argument of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Reference into the arena of drawn graphics.
    Graphic(GraphicId),
    Int(i64),
    Number(f64),
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub graphic: GraphicId,
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub key: Option<SortKey>,
    pub args: Vec<Arg>,
}

impl Instruction {
    pub fn new(args: Vec<Arg>) -> Self {
        Self { key: None, args }
    }

    pub fn keyed(graphic: GraphicId, slot: usize, args: Vec<Arg>) -> Self {
        Self {
            key: Some(SortKey { graphic, slot }),
            args,
        }
    }
}

/// Properties of a single view, kinds kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyList {
    entries: Vec<(PropertyKind, Vec<Instruction>)>,
}

impl PropertyList {
    pub fn push(&mut self, kind: PropertyKind, instruction: Instruction) {
        self.extend(kind, vec![instruction]);
    }

    fn extend(&mut self, kind: PropertyKind, instructions: Vec<Instruction>) {
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, list)) => list.extend(instructions),
            None => self.entries.push((kind, instructions)),
        }
    }

    pub fn get(&self, kind: &PropertyKind) -> Option<&[Instruction]> {
        self.entries
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, list)| list.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKind, &[Instruction])> {
        self.entries
            .iter()
            .map(|(kind, list)| (kind, list.as_slice()))
    }

    pub fn merge(&mut self, other: PropertyList) {
        for (kind, instructions) in other.entries {
            self.extend(kind, instructions);
        }
    }

    fn sort_draw_order(&mut self) {
        for (kind, list) in &mut self.entries {
            if kind.is_sortable() {
                sort_draw_order(list);
                for instruction in list.iter_mut() {
                    instruction.key = None;
                }
            }
        }
    }
}

/// View name to property kind to instructions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewProperties {
    views: BTreeMap<String, PropertyList>,
}

impl ViewProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, view: &str, kind: PropertyKind, instruction: Instruction) {
        self.views
            .entry(view.to_string())
            .or_default()
            .push(kind, instruction);
    }

    pub fn view(&self, name: &str) -> Option<&PropertyList> {
        self.views.get(name)
    }

    pub fn views(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn clear(&mut self) {
        self.views.clear();
    }

    /// Deep merge: views and kinds merge recursively, instruction lists of
    /// the same kind concatenate with `other` appended.
    pub fn merge(&mut self, other: ViewProperties) {
        for (view, list) in other.views {
            self.views.entry(view).or_default().merge(list);
        }
    }

    /// Puts every sortable list in draw order and strips the sort keys.
    pub fn finish(&mut self) {
        for list in self.views.values_mut() {
            list.sort_draw_order();
        }
    }
}

/// Sorts by slot, ties broken by the global graphic index. Unkeyed
/// instructions keep their relative order ahead of the keyed ones.
pub fn sort_draw_order(instructions: &mut [Instruction]) {
    instructions.sort_by_key(|instruction| instruction.key.map(|key| (key.slot, key.graphic)));
}

/// Views to create, in order: confirmed targets sorted by slot (stable),
/// each name taken the first time it appears.
pub fn creation_order(confirmed: &[ViewTarget]) -> Vec<String> {
    let mut sorted: Vec<&ViewTarget> = confirmed.iter().collect();
    sorted.sort_by_key(|target| target.slot);

    let mut seen = HashSet::new();
    let mut order = Vec::new();

    for target in sorted {
        if seen.insert(target.view.as_str()) {
            order.push(target.view.clone());
        } else {
            tracing::debug!(view = %target.view, slot = target.slot, "view already created");
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(slot: usize, global: usize) -> Instruction {
        Instruction::keyed(
            GraphicId(global),
            slot,
            vec![Arg::Graphic(GraphicId(global))],
        )
    }

    #[test]
    fn test_creation_order_by_slot() {
        let confirmed = vec![
            ViewTarget::new("v", 2),
            ViewTarget::new("v", 1),
            ViewTarget::new("w", 0),
        ];
        assert_eq!(creation_order(&confirmed), vec!["w", "v"]);
    }

    #[test]
    fn test_creation_order_stable_for_equal_slots() {
        let confirmed = vec![
            ViewTarget::new("b", 0),
            ViewTarget::new("a", 0),
            ViewTarget::new("b", 1),
        ];
        assert_eq!(creation_order(&confirmed), vec!["b", "a"]);
    }

    #[test]
    fn test_draw_order_total() {
        let mut list = vec![keyed(1, 5), keyed(0, 9), keyed(1, 2)];
        sort_draw_order(&mut list);

        let order: Vec<_> = list
            .iter()
            .map(|i| i.key.map(|k| (k.slot, k.graphic.0)))
            .collect();
        assert_eq!(order, vec![Some((0, 9)), Some((1, 2)), Some((1, 5))]);
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let mut first = ViewProperties::new();
        first.push("plot", PropertyKind::GraphicEx, keyed(1, 0));
        first.push("plot", PropertyKind::Set, Instruction::new(vec![Arg::Bool(false)]));

        let mut second = ViewProperties::new();
        second.push("plot", PropertyKind::GraphicEx, keyed(0, 1));
        second.push("other", PropertyKind::Area, keyed(0, 2));

        first.merge(second);

        let plot = first.view("plot").unwrap();
        let kinds: Vec<_> = plot.iter().map(|(kind, _)| kind.clone()).collect();
        assert_eq!(kinds, vec![PropertyKind::GraphicEx, PropertyKind::Set]);
        assert_eq!(
            plot.get(&PropertyKind::GraphicEx).unwrap(),
            &[keyed(1, 0), keyed(0, 1)]
        );
        assert!(first.view("other").is_some());
    }

    #[test]
    fn test_finish_sorts_and_strips_keys() {
        let mut props = ViewProperties::new();
        props.push("plot", PropertyKind::GraphicEx, keyed(1, 0));
        props.push("plot", PropertyKind::GraphicEx, keyed(0, 1));
        props.finish();

        let list = props
            .view("plot")
            .unwrap()
            .get(&PropertyKind::GraphicEx)
            .unwrap();
        assert!(list.iter().all(|i| i.key.is_none()));
        assert_eq!(list[0].args, vec![Arg::Graphic(GraphicId(1))]);
        assert_eq!(list[1].args, vec![Arg::Graphic(GraphicId(0))]);
    }

    #[test]
    fn test_property_kind_names() {
        let kind: PropertyKind = "graphicEx".parse().unwrap();
        assert_eq!(kind, PropertyKind::GraphicEx);
        assert_eq!(kind.method(), "addGraphicEx");

        let custom: PropertyKind = "setTitle".parse().unwrap();
        assert_eq!(custom.method(), "setTitle");
        assert!(!custom.is_sortable());
    }
}

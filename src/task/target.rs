use std::fmt::Display;

/// Where a task draws: a view and the 0-based slot inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewTarget {
    pub view: String,
    pub slot: usize,
}

impl ViewTarget {
    pub fn new(view: impl Into<String>, slot: usize) -> Self {
        Self {
            view: view.into(),
            slot,
        }
    }
}

impl Display for ViewTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.view, self.slot)
    }
}

/// Parses `view:slot` tokens separated by commas. Slots are 1-based in the
/// text and 0-based in the result. A token without a view name or with a
/// slot below 1 is dropped, the remaining tokens are still parsed.
pub fn parse_targets(text: &str) -> Vec<ViewTarget> {
    text.split(',')
        .filter_map(|token| {
            let token = token.trim();
            let parsed = parse_token(token);
            if parsed.is_none() && !token.is_empty() {
                tracing::debug!(token, "dropping malformed view target");
            }
            parsed
        })
        .collect()
}

fn parse_token(token: &str) -> Option<ViewTarget> {
    let (view, slot) = token.rsplit_once(':')?;
    let view = view.trim();
    let slot = slot.trim().parse::<i64>().ok()?;

    if view.is_empty() || slot <= 0 {
        return None;
    }

    Some(ViewTarget::new(view, (slot - 1) as usize))
}

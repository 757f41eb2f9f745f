//! Messages collected during a run and printed once it is over.
use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

use crate::host::{Report, Translate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Error,
    Warning,
    Hint,
    Summary,
}

impl Category {
    /// Every category, in printing order.
    pub const ALL: [Category; 4] = [
        Category::Error,
        Category::Warning,
        Category::Hint,
        Category::Summary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Error => "error",
            Category::Warning => "warning",
            Category::Hint => "hint",
            Category::Summary => "summary",
        }
    }

    /// Translation key of the header printed above the category.
    fn header_key(self) -> Option<&'static str> {
        match self {
            Category::Error => Some("messages.error"),
            Category::Warning => Some("messages.warning"),
            Category::Hint => Some("messages.hint"),
            Category::Summary => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Category::Error),
            "warning" => Ok(Category::Warning),
            "hint" => Ok(Category::Hint),
            "summary" => Ok(Category::Summary),
            _ => Err(()),
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Line,
    Paragraph,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Primary text, also the de-duplication key.
    pub text: String,
    pub detail: Option<String>,
    pub format: Format,
    /// Print only the first message with this text.
    pub once: bool,
}

impl Message {
    pub fn line(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            detail: None,
            format: Format::Line,
            once: false,
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            format: Format::Paragraph,
            ..Self::line(text)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct MessageCollector {
    messages: [Vec<Message>; 4],
    print_once: bool,
}

impl MessageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat every message as print-once.
    pub fn set_print_once(&mut self, print_once: bool) {
        self.print_once = print_once;
    }

    /// Adds a message under a category given by name. Returns `false` when
    /// the category is empty or unknown.
    pub fn add_message(&mut self, category: &str, message: Message) -> bool {
        match category.parse::<Category>() {
            Ok(category) => {
                self.add(category, message);
                true
            }
            Err(()) => {
                tracing::debug!(category, "dropping message with unknown category");
                false
            }
        }
    }

    pub fn add(&mut self, category: Category, message: Message) {
        self.messages[category.index()].push(message);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.add(Category::Error, Message::line(text));
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.add(Category::Warning, Message::line(text));
    }

    pub fn hint(&mut self, text: impl Into<String>) {
        self.add(Category::Hint, Message::line(text));
    }

    pub fn summary(&mut self, text: impl Into<String>) {
        self.add(Category::Summary, Message::line(text));
    }

    pub fn messages(&self, category: Category) -> &[Message] {
        &self.messages[category.index()]
    }

    pub fn count(&self, category: Category) -> usize {
        self.messages(category).len()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Category::Error) > 0
    }

    /// Prints every non-empty category to `report`, then shows the report
    /// surface if there were errors.
    pub fn print_all(&self, report: &mut dyn Report, translate: &dyn Translate) {
        for category in Category::ALL {
            let messages = self.messages(category);
            if messages.is_empty() {
                continue;
            }

            // Print-once only collapses repeats within a category.
            let mut seen = HashSet::new();

            if let Some(key) = category.header_key() {
                report.header(&translate.translate(key, &[]));
            }

            for message in messages {
                if (self.print_once || message.once) && !seen.insert(message.text.as_str()) {
                    continue;
                }

                match (message.format, &message.detail) {
                    (Format::Line, None) => report.line(&message.text),
                    (Format::Line, Some(detail)) => {
                        report.line(&format!("{}: {}", message.text, detail))
                    }
                    (Format::Paragraph, None) => report.paragraph(&message.text),
                    (Format::Paragraph, Some(detail)) => {
                        report.paragraph(&format!("{}\n{}", message.text, detail))
                    }
                }
            }
        }

        if self.has_errors() {
            report.show();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{BufferReport, Catalog};

    #[test]
    fn test_add_message_rejects_unknown_category() {
        let mut messages = MessageCollector::new();
        assert!(!messages.add_message("", Message::line("x")));
        assert!(!messages.add_message("fatal", Message::line("x")));
        assert!(messages.add_message("warning", Message::line("x")));
        assert_eq!(messages.count(Category::Warning), 1);
    }

    #[test]
    fn test_print_all_headers_and_order() {
        let mut messages = MessageCollector::new();
        messages.summary("3 tasks");
        messages.hint("check input");
        messages.warning("slow");

        let mut report = BufferReport::new();
        let catalog = Catalog::new().insert("messages.warning", "Warnings");
        messages.print_all(&mut report, &catalog);

        assert_eq!(
            report.lines(),
            vec!["Warnings", "slow", "messages.hint", "check input", "3 tasks"]
        );
        assert!(!report.was_shown());
    }

    #[test]
    fn test_print_once_deduplicates_by_text() {
        let mut messages = MessageCollector::new();
        messages.add(Category::Hint, Message::line("same").once());
        messages.add(Category::Hint, Message::line("same").once());
        messages.add(Category::Hint, Message::line("other"));
        messages.add(Category::Hint, Message::line("other"));

        let mut report = BufferReport::new();
        messages.print_all(&mut report, &Catalog::new());
        assert_eq!(
            report.lines(),
            vec!["messages.hint", "same", "other", "other"]
        );
    }

    #[test]
    fn test_print_once_is_per_category() {
        let mut messages = MessageCollector::new();
        messages.set_print_once(true);
        messages.error("input missing");
        messages.error("input missing");
        messages.hint("input missing");

        let mut report = BufferReport::new();
        messages.print_all(&mut report, &Catalog::new());
        assert_eq!(
            report.lines(),
            vec![
                "messages.error",
                "input missing",
                "messages.hint",
                "input missing"
            ]
        );
    }

    #[test]
    fn test_errors_show_report() {
        let mut messages = MessageCollector::new();
        messages.add(
            Category::Error,
            Message::paragraph("Task 'a' failed").with_detail("boom"),
        );

        let mut report = BufferReport::new();
        messages.print_all(&mut report, &Catalog::new());
        assert!(report.was_shown());
        assert_eq!(report.lines()[1], "Task 'a' failed\nboom");
    }
}

use console::{Style, style};
use indicatif::{ProgressBar, ProgressStyle};

use crate::host::{CancelToken, Progress, Report};

const ANSI_BLUE: Style = Style::new().blue();

/// Progress bar on stderr, cancellable through a [`CancelToken`].
pub struct BarProgress {
    bar: ProgressBar,
    token: CancelToken,
}

impl BarProgress {
    pub fn new(token: CancelToken) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(template) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(template.progress_chars("#>-"));
        }

        Self { bar, token }
    }
}

impl Progress for BarProgress {
    fn can_continue(&self) -> bool {
        !self.token.is_cancelled()
    }

    fn set_length(&self, len: u64) {
        self.bar.set_length(len);
    }

    fn set_progress(&self, step: u64) {
        self.bar.set_position(step);
    }

    fn set_status_text(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Prints collected messages to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReport {
    shown: bool,
}

impl Report for ConsoleReport {
    fn header(&mut self, text: &str) {
        eprintln!("{}", style(text).bold().underlined());
    }

    fn line(&mut self, text: &str) {
        eprintln!("  {text}");
    }

    fn paragraph(&mut self, text: &str) {
        eprintln!();
        for line in text.lines() {
            eprintln!("  {line}");
        }
    }

    fn show(&mut self) {
        if !self.shown {
            self.shown = true;
            eprintln!("{}", ANSI_BLUE.apply_to("See the messages above for errors."));
        }
    }
}

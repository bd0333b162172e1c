use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use streamtail_engine::StatusEvent;
use tracing::debug;

use super::format_bytes;

fn status_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Status line shown for a completed segment.
pub fn status_line(event: &StatusEvent) -> String {
    format!(
        "BytesTotal: {}, DownloadRate: {}/s",
        format_bytes(event.bytes_total),
        format_bytes(event.bytes_per_second)
    )
}

/// Spinner on stderr that tracks the session's status events.
pub struct ProgressManager {
    bar: Option<ProgressBar>,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    pub fn new_disabled() -> Self {
        Self { bar: None }
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, target);
        bar.set_style(status_style());
        bar.set_message("Waiting for segments");
        bar.enable_steady_tick(Duration::from_millis(250));
        Self { bar: Some(bar) }
    }

    pub fn handle_event(&self, event: &StatusEvent) {
        let line = status_line(event);
        match &self.bar {
            Some(bar) => bar.set_message(line),
            None => debug!(segment = %event.last_file, "{line}"),
        }
    }

    pub fn finish(&self, message: impl Into<String>) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.into());
        }
    }

    /// Current spinner message, if the spinner is enabled.
    #[cfg(test)]
    fn message(&self) -> Option<String> {
        self.bar.as_ref().map(ProgressBar::message)
    }
}

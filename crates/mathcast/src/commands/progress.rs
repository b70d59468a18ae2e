//! Terminal progress for pipeline runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use mathcast_pipeline::ProgressSink;

/// Spinner that shows the stage currently executing.
///
/// Hidden in JSON mode so stdout stays machine-readable.
pub struct StageSpinner {
    bar: ProgressBar,
    total: usize,
}

impl StageSpinner {
    pub fn new(total: usize, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };
        Self { bar, total }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for StageSpinner {
    fn stage_started(&self, stage_index: usize, stage_name: &str) {
        self.bar.set_message(format!(
            "[{}/{}] {}",
            stage_index + 1,
            self.total,
            stage_name
        ));
        tracing::debug!(stage = stage_index, name = stage_name, "Stage started");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_spinner_tracks_message() {
        let spinner = StageSpinner::new(4, true);
        spinner.stage_started(2, "Synthesize Narration");
        assert_eq!(spinner.bar.message(), "[3/4] Synthesize Narration");
        spinner.finish();
    }
}

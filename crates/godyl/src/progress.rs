//! Download progress bars.

use godyl_core::download::ProgressReporter;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;
use std::collections::HashMap;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix:<24!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {prefix:<24!} {bytes} {bytes_per_sec}";

/// One bar per in-flight download, stacked on stderr.
pub struct BarProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl BarProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Bars drawn to `target`; tests use a hidden target.
    #[must_use]
    pub fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn style(total: Option<u64>) -> ProgressStyle {
        let template = if total.is_some() {
            BAR_TEMPLATE
        } else {
            SPINNER_TEMPLATE
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }

    #[cfg(test)]
    fn active(&self) -> usize {
        self.bars.lock().len()
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarProgress {
    fn start(&self, label: &str, total: Option<u64>) {
        let bar = self
            .multi
            .add(total.map_or_else(ProgressBar::new_spinner, ProgressBar::new));
        bar.set_style(Self::style(total));
        bar.set_prefix(label.to_string());
        self.bars.lock().insert(label.to_string(), bar);
    }

    fn update(&self, label: &str, current: u64, total: Option<u64>) {
        if let Some(bar) = self.bars.lock().get(label) {
            if let Some(total) = total {
                bar.set_length(total);
            }
            bar.set_position(current);
        }
    }

    fn finish(&self, label: &str) {
        if let Some(bar) = self.bars.lock().remove(label) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_track_downloads() {
        let progress = BarProgress::with_target(ProgressDrawTarget::hidden());
        progress.start("jq", Some(100));
        progress.start("yq", None);
        progress.update("jq", 50, Some(100));
        progress.update("unknown", 1, None);
        assert_eq!(progress.active(), 2);

        progress.finish("jq");
        progress.finish("yq");
        assert_eq!(progress.active(), 0);
    }
}

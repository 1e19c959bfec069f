//! Terminal progress bar for a download run
//!
//! Wraps an indicatif bar behind the [`ProgressSink`] seam the workers report
//! to. The bar draws on stderr and stays hidden when stderr is not a terminal
//! or output is suppressed.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::app::ProgressSink;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA {eta}) {msg}";

/// Progress display for partitions
#[derive(Debug, Clone)]
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    /// Create a bar for `total` partitions
    ///
    /// The bar is hidden when `enabled` is false or stderr is not a terminal.
    pub fn new(total: u64, message: impl Into<String>, enabled: bool) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        let bar = if enabled && is_terminal {
            let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
            bar.set_style(bar_style());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };
        bar.set_length(total);
        bar.set_message(message.into());

        Self { bar }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

impl ProgressSink for ProgressDisplay {
    fn advance(&self, n: u64) {
        self.bar.inc(n);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

//! Transfer progress display with progress bars.

use indicatif::{ProgressBar, ProgressStyle};

/// Transfer progress tracker
pub struct TransferProgress {
    bar: ProgressBar,
}

impl TransferProgress {
    /// Create a new progress tracker
    #[must_use]
    pub fn new(total_bytes: u64, filename: &str) -> Self {
        let bar = ProgressBar::new(total_bytes);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );

        bar.set_message(format!("Transferring: {filename}"));

        Self { bar }
    }

    /// Advance by `bytes`
    pub fn inc(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    /// Finish and remove the bar
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

//! Console rendering of prompts, notes and progress.

use crate::progress::TransferProgress;
use async_trait::async_trait;
use console::style;
use ferry_core::Ui;
use std::sync::Mutex;

/// Interactive terminal [`Ui`].
pub struct ConsoleUi {
    bar: Mutex<Option<TransferProgress>>,
}

impl ConsoleUi {
    /// A fresh console UI with no active progress bar.
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Ui for ConsoleUi {
    async fn confirm(&self, prompt: &str) -> bool {
        let term = console::Term::stderr();
        let _ = term.write_str(&format!("{} [y/N] ", style(prompt).bold()));
        match term.read_line() {
            Ok(line) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }

    fn note(&self, text: &str) {
        eprintln!("{text}");
    }

    fn begin_file(&self, name: &str, size: u64) {
        *self.bar.lock().expect("progress lock poisoned") =
            Some(TransferProgress::new(size, name));
    }

    fn advance(&self, bytes: u64) {
        if let Some(bar) = self.bar.lock().expect("progress lock poisoned").as_ref() {
            bar.inc(bytes);
        }
    }

    fn finish_file(&self) {
        if let Some(bar) = self.bar.lock().expect("progress lock poisoned").take() {
            bar.finish();
        }
    }
}

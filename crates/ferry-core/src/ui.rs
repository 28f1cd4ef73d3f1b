//! User interaction seam.
//!
//! The state machines talk to the user only through this trait, so the
//! binary can render with real prompts and progress bars while tests run
//! headless.

use async_trait::async_trait;

/// Prompts, notes and transfer progress.
#[async_trait]
pub trait Ui: Send + Sync {
    /// Ask a yes/no question.
    async fn confirm(&self, prompt: &str) -> bool;

    /// Print one user-facing line.
    fn note(&self, text: &str);

    /// A file transfer is starting.
    fn begin_file(&self, name: &str, size: u64);

    /// `bytes` more of the current file moved.
    fn advance(&self, bytes: u64);

    /// The current file finished.
    fn finish_file(&self);
}

/// Silent [`Ui`] answering every prompt with a fixed choice.
pub struct HeadlessUi {
    /// Answer to every confirm prompt
    pub accept: bool,
}

#[async_trait]
impl Ui for HeadlessUi {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.accept
    }

    fn note(&self, _text: &str) {}

    fn begin_file(&self, _name: &str, _size: u64) {}

    fn advance(&self, _bytes: u64) {}

    fn finish_file(&self) {}
}

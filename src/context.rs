//! Progress reporting and cooperative cancellation

use crate::error::{Error, Result};

/// Host callbacks observed while an embedding runs.
///
/// Both callbacks are optional: an absent progress callback reports nowhere
/// and an absent cancel predicate never cancels. The pipeline polls
/// `is_cancelled` at method entry, at the top of each row of the parallel
/// matrix builders and between outer iterations of the iterative embedders;
/// work in flight below those checkpoints is never interrupted.
#[derive(Default, Clone, Copy)]
pub struct Context<'a> {
    progress: Option<&'a (dyn Fn(f64) + Sync)>,
    cancel: Option<&'a (dyn Fn() -> bool + Sync)>,
}

impl<'a> Context<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: &'a (dyn Fn(f64) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a (dyn Fn() -> bool + Sync)) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Report a completed fraction in `[0, 1]`.
    pub fn report_progress(&self, fraction: f64) {
        if let Some(progress) = self.progress {
            progress(fraction.clamp(0.0, 1.0));
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.map_or(false, |cancel| cancel())
    }

    /// Fail with [`Error::Cancelled`] if the host asked to stop.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

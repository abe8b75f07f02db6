use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lex_core::error::AppError;

/// Cooperative cancellation flag shared between a caller and one pipeline run.
/// Stages check it before starting; an in-flight model call is not interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(REQUEST_CANCELLED)` once cancelled.
    pub fn check(&self) -> Result<(), AppError> {
        if self.is_cancelled() {
            return Err(AppError::cancelled());
        }
        Ok(())
    }
}

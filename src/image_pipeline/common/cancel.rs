use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::image_pipeline::common::error::{ProcessingError, Result};

/// Cooperative cancellation flag shared between a caller and a running
/// derivative job. Checked before every external tool invocation and while
/// waiting on one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(ProcessingError::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}

/// Convenience for the common `Option<&CancellationToken>` parameter.
pub fn check(token: Option<&CancellationToken>, stage: &str) -> Result<()> {
    token.map_or(Ok(()), |t| t.check(stage))
}

//! Cooperative cancellation.
//!
//! A [`CancelToken`] is shared between whoever starts a build and the build
//! itself. The build checks it between pages and between assets; once
//! cancelled it unwinds with [`BuildError::Interrupted`], which callers treat
//! as a deliberate stop rather than a failure.

use crate::build::BuildError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Calling this more than once is harmless.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(BuildError::Interrupted)` once cancellation was requested.
    pub fn check(&self) -> Result<(), BuildError> {
        if self.is_cancelled() {
            Err(BuildError::Interrupted)
        } else {
            Ok(())
        }
    }
}

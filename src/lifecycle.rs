// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Single-shot shutdown signalling for background reflectors.
//!
//! [`ShutdownGuard`] owns the shared signal. Its one-shot flag lives behind a
//! mutex so that concurrent callers are serialized: exactly one of them flips
//! the flag and signals, every other caller gets
//! [`MirrorError::ShutdownInProgress`]. Reflectors hold a [`ShutdownSignal`]
//! and observe it while waiting on remote calls.
//!
//! Dropping the guard also releases every waiting [`ShutdownSignal`], so a
//! mirror that is dropped without `stop` does not leak running reflectors.

use crate::dns_errors::MirrorError;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tracing::info;

/// Owner of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownGuard {
    shutdown: Mutex<bool>,
    sender: watch::Sender<bool>,
}

impl Default for ShutdownGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownGuard {
    /// Create a guard in the running state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            shutdown: Mutex::new(false),
            sender,
        }
    }

    /// Obtain a signal that resolves once shutdown is triggered.
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Trigger shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::ShutdownInProgress`] if shutdown was already
    /// triggered by an earlier call.
    pub fn trigger(&self) -> Result<(), MirrorError> {
        let mut shutdown = self.shutdown.lock().unwrap_or_else(PoisonError::into_inner);
        if *shutdown {
            return Err(MirrorError::ShutdownInProgress);
        }

        *shutdown = true;
        self.sender.send_replace(true);
        info!("Shutting down cluster mirror reflectors");

        Ok(())
    }

    /// Whether shutdown has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.shutdown.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether shutdown has been signalled (or the guard was dropped).
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }

    /// Wait until shutdown is signalled or the guard is dropped.
    pub async fn wait(&mut self) {
        // An error means the guard is gone, which is treated as shutdown.
        let _ = self.receiver.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod lifecycle_tests;

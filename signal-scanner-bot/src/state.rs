//! Listening state shared by the relay directions.
//!
//! `listening` gates the microblog to messaging direction and is persisted as the
//! presence of a marker file. `stop_requested` is set once, on unrecoverable failure,
//! and never cleared.

use crate::command::{ACTIVATED_NOTICE, DEACTIVATED_NOTICE};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Errors updating the marker file
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Creating or removing the marker failed
    #[error("Could not update listening marker {path}: {source}")]
    Marker {
        /// Marker path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Process-wide relay state, shared by reference between the pipelines
#[derive(Debug)]
pub struct ListeningState {
    listening: AtomicBool,
    stop_requested: AtomicBool,
    marker: PathBuf,
    marker_lock: Mutex<()>,
}

impl ListeningState {
    /// Initialize from the marker: present means listening.
    pub fn load(marker: impl Into<PathBuf>) -> Self {
        let marker = marker.into();
        let listening = marker.exists();
        debug!(
            "Listening marker {} exists: {listening}",
            marker.display()
        );
        Self {
            listening: AtomicBool::new(listening),
            stop_requested: AtomicBool::new(false),
            marker,
            marker_lock: Mutex::new(()),
        }
    }

    /// Path of the marker file
    pub fn marker_path(&self) -> &Path {
        &self.marker
    }

    /// Whether statuses are currently relayed to the messaging channel
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Set the flag and create or remove the marker to match.
    ///
    /// Removing a marker that is already gone is fine.
    pub async fn set_listening(&self, listening: bool) -> Result<(), StateError> {
        let _guard = self.marker_lock.lock().await;
        let result = if listening {
            tokio::fs::write(&self.marker, b"").await
        } else {
            match tokio::fs::remove_file(&self.marker).await {
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            }
        };
        result.map_err(|source| StateError::Marker {
            path: self.marker.clone(),
            source,
        })?;
        self.listening.store(listening, Ordering::SeqCst);
        info!("Listening: {listening}");
        Ok(())
    }

    /// Whether an unrecoverable failure has stopped the relay
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Ask every pipeline to stop. Cannot be undone.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// The notice matching the current flag
    pub fn status_notice(&self) -> &'static str {
        if self.is_listening() {
            ACTIVATED_NOTICE
        } else {
            DEACTIVATED_NOTICE
        }
    }
}

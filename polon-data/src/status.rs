//! Degradation reporting: which fallback layer is currently active.
//!
//! Transport failure must never surface as a visible application error, so
//! the components that detect degradation raise flags here instead. The UI
//! layer polls [`DegradationReporter::read`] or subscribes for changes.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Process-wide indicators describing which fallback layer is active.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct DegradationFlags {
    /// At least one request was carried by a relay instead of the direct stage.
    pub using_proxy: bool,
    /// At least one feed value was synthesized locally.
    pub using_simulated_data: bool,
    /// At least one feed session fell back from its push stream to polling.
    pub using_polled_feed: bool,
}

/// Observable projection of the degradation flags.
///
/// Clones share the same underlying channel. Flags are written only by the
/// components that detect degradation; consumers read or subscribe.
#[derive(Debug, Clone)]
pub struct DegradationReporter {
    tx: Arc<watch::Sender<DegradationFlags>>,
}

impl DegradationReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DegradationFlags::default());
        Self { tx: Arc::new(tx) }
    }

    /// Current flags snapshot.
    pub fn read(&self) -> DegradationFlags {
        *self.tx.borrow()
    }

    /// Receiver notified on every flag change.
    pub fn subscribe(&self) -> watch::Receiver<DegradationFlags> {
        self.tx.subscribe()
    }

    pub(crate) fn set_using_proxy(&self) {
        self.raise("transport relay active", |flags| &mut flags.using_proxy);
    }

    pub(crate) fn set_using_simulated_data(&self) {
        self.raise("synthesizing feed values locally", |flags| {
            &mut flags.using_simulated_data
        });
    }

    pub(crate) fn set_using_polled_feed(&self) {
        self.raise("push stream replaced by polling", |flags| {
            &mut flags.using_polled_feed
        });
    }

    /// Set a single flag, notifying subscribers and logging on the rising
    /// edge only.
    fn raise(&self, what: &str, field: impl Fn(&mut DegradationFlags) -> &mut bool) {
        let changed = self.tx.send_if_modified(|flags| {
            let slot = field(flags);
            if *slot {
                false
            } else {
                *slot = true;
                true
            }
        });

        if changed {
            warn!("degraded: {what}");
        }
    }
}

impl Default for DegradationReporter {
    fn default() -> Self {
        Self::new()
    }
}

//! Result handoff to the data-entry form.

use crate::{FormHandle, NavigatorHandle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The record the form is populated with. Only the lane is scanned; the
/// other fields start blank for the worker to fill in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedData {
    pub init_wh_lane: String,
    pub item_no: String,
    pub expiration_date: String,
    pub no_of_carton: String,
    pub loose_carton_quantity: String,
}
impl ScannedData {
    /// A record for `lane`. An empty lane means the user skipped scanning.
    pub fn lane(lane: impl Into<String>) -> Self {
        Self { init_wh_lane: lane.into(), ..Default::default() }
    }
}

/// Receives the scanned record.
pub trait FormSink: Send + Sync {
    fn populate(&self, data: ScannedData);
}

/// Moves the UI from the scanner to the form.
pub trait Navigator: Send + Sync {
    fn proceed_to_form(&self);
}

/// The outbound pair: populate the form, then navigate to it.
#[derive(Clone)]
pub struct Handoff {
    form: FormHandle,
    navigator: NavigatorHandle,
}
impl Handoff {
    pub fn new(form: FormHandle, navigator: NavigatorHandle) -> Self {
        Self { form, navigator }
    }

    pub fn deliver(&self, lane: &str) {
        tracing::info!(lane, skipped = lane.is_empty(), "Handing scan result to form");
        self.form.populate(ScannedData::lane(lane));
        self.navigator.proceed_to_form();
    }

    /// Deliver `lane` after `delay`, unless cancelled first.
    pub fn schedule(&self, lane: String, delay: Duration) -> PendingHandoff {
        let handoff = self.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(lane, "Scheduled handoff cancelled");
                    false
                },
                () = tokio::time::sleep(delay) => {
                    handoff.deliver(&lane);
                    true
                },
            }
        });
        PendingHandoff { cancel, task: Some(task), delivered: false }
    }
}

/// A handoff waiting out the success-feedback delay.
///
/// Dropping it cancels the handoff if it hasn't fired yet.
pub struct PendingHandoff {
    cancel: CancellationToken,
    task: Option<JoinHandle<bool>>,
    delivered: bool,
}
impl PendingHandoff {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the handoff to fire or be cancelled. Returns whether it
    /// fired. Safe to call again, and safe to abandon part-way.
    pub async fn wait(&mut self) -> bool {
        if let Some(task) = self.task.as_mut() {
            self.delivered = task.await.unwrap_or(false);
            self.task = None;
        }
        self.delivered
    }
}

impl Drop for PendingHandoff {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingHandoff;
    use std::sync::Arc;

    #[test]
    fn test_scanned_data_field_names() {
        let json = serde_json::to_value(ScannedData::lane("A-01-03")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "initWhLane": "A-01-03",
                "itemNo": "",
                "expirationDate": "",
                "noOfCarton": "",
                "looseCartonQuantity": "",
            })
        );
    }

    #[tokio::test]
    async fn test_scheduled_handoff_fires_after_delay() {
        let recorder = Arc::new(RecordingHandoff::default());
        let mut pending = recorder.handoff().schedule("ABC123".to_string(), Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(recorder.values().is_empty());
        assert!(pending.wait().await);
        assert!(pending.wait().await);
        assert_eq!(recorder.values(), vec!["ABC123"]);
        assert_eq!(recorder.navigations(), 1);
    }

    #[tokio::test]
    async fn test_dropping_pending_handoff_cancels_it() {
        let recorder = Arc::new(RecordingHandoff::default());
        let pending = recorder.handoff().schedule("ABC123".to_string(), Duration::from_millis(20));
        drop(pending);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(recorder.values().is_empty());
        assert_eq!(recorder.navigations(), 0);
    }
}

//! Recording form and navigator for testing.

use crate::handoff::{FormSink, Handoff, Navigator, ScannedData};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Records every record it's given and counts navigations.
#[derive(Default)]
pub struct RecordingHandoff {
    records: Mutex<Vec<ScannedData>>,
    navigations: AtomicUsize,
}
impl RecordingHandoff {
    /// A [`Handoff`] feeding this recorder as both form and navigator.
    pub fn handoff(self: &Arc<Self>) -> Handoff {
        Handoff::new(self.clone(), self.clone())
    }

    pub fn records(&self) -> Vec<ScannedData> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The lane of each record, in delivery order.
    pub fn values(&self) -> Vec<String> {
        self.records().into_iter().map(|record| record.init_wh_lane).collect()
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

impl FormSink for RecordingHandoff {
    fn populate(&self, data: ScannedData) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(data);
    }
}

impl Navigator for RecordingHandoff {
    fn proceed_to_form(&self) {
        self.navigations.fetch_add(1, Ordering::SeqCst);
    }
}

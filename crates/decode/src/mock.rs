//! Scripted decode engine for testing.

use crate::engine::SymbolDecoder;
use crate::error::{ErrorKind, Result};
use crate::event::Symbol;
use crate::symbology::Symbology;
use binscan_capture::Frame;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Hit(Symbol),
    Miss,
    Fail,
}

/// A [`SymbolDecoder`] that answers each call from a script.
///
/// Once the script runs out every further call is a miss, unless
/// [`repeat_last()`](Self::repeat_last) was set.
#[derive(Default)]
pub struct ScriptedDecoder {
    script: Mutex<VecDeque<Step>>,
    repeat_last: bool,
    cadence: Option<Duration>,
    calls: AtomicUsize,
    formats: Mutex<Vec<Vec<Symbology>>>,
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next call finds `text` as Code 128.
    pub fn hit(self, text: &str) -> Self {
        self.hit_as(text, Symbology::Code128)
    }

    pub fn hit_as(self, text: &str, format: Symbology) -> Self {
        self.push(Step::Hit(Symbol::new(text, format)))
    }

    pub fn miss(self) -> Self {
        self.push(Step::Miss)
    }

    pub fn misses(self, count: usize) -> Self {
        (0..count).fold(self, |decoder, _| decoder.miss())
    }

    /// Next call fails with an engine error.
    pub fn fail(self) -> Self {
        self.push(Step::Fail)
    }

    /// Keep answering with the final step once the script runs out.
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = Some(cadence);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The format list passed on each call.
    pub fn formats_seen(&self) -> Vec<Vec<Symbology>> {
        lock(&self.formats).clone()
    }

    fn push(self, step: Step) -> Self {
        lock(&self.script).push_back(step);
        self
    }

    fn next_step(&self) -> Step {
        let mut script = lock(&self.script);
        if self.repeat_last && script.len() == 1 {
            return script[0].clone();
        }
        script.pop_front().unwrap_or(Step::Miss)
    }
}

impl SymbolDecoder for ScriptedDecoder {
    fn name(&self) -> &str {
        "scripted"
    }

    fn decode(&self, _frame: &Frame, formats: &[Symbology]) -> Result<Option<Symbol>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.formats).push(formats.to_vec());
        match self.next_step() {
            Step::Hit(symbol) => Ok(Some(symbol)),
            Step::Miss => Ok(None),
            Step::Fail => exn::bail!(ErrorKind::Engine("scripted failure".to_string())),
        }
    }

    fn cadence(&self) -> Option<Duration> {
        self.cadence
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

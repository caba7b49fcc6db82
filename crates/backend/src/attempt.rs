//! Lazy decode-attempt streams.
//!
//! Each stream yields one [`Attempt`] per frame for as long as its source
//! lives. Nothing is read from the track until the stream is polled.

use crate::error::ErrorKind;
use crate::event::{BackendEvent, EventSink};
use async_stream::stream;
use binscan_capture::{Frame, TrackHandle};
use binscan_decode::{DecodedEvent, DecoderHandle, Formats};
use futures::{Stream, StreamExt};
use std::pin::pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Outcome of running the engine over one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attempt {
    Hit(DecodedEvent),
    /// No symbol in this frame, or the engine hiccuped on it.
    Miss,
    /// The source ended; no further attempts follow.
    Lost,
}

/// What the worker loop's sampler hands to its worker.
pub(crate) enum Sample {
    Frame(Frame),
    Lost,
}

/// Run the engine over `frame` on the blocking pool.
///
/// Engine errors and worker panics are reported as a [`Miss`](Attempt::Miss).
pub(crate) async fn decode_frame(decoder: &DecoderHandle, frame: Frame, formats: &Formats) -> Attempt {
    let decoder = decoder.clone();
    let formats = formats.clone();
    let engine = decoder.name().to_string();
    match tokio::task::spawn_blocking(move || decoder.decode(&frame, formats.as_slice())).await {
        Ok(Ok(Some(symbol))) => {
            tracing::debug!(engine, text = %symbol.text, format = %symbol.format, "Symbol decoded");
            Attempt::Hit(DecodedEvent::from(symbol))
        },
        Ok(Ok(None)) => Attempt::Miss,
        Ok(Err(err)) => {
            tracing::debug!(engine, error = %*err, "Decode engine failed on frame; skipping");
            Attempt::Miss
        },
        Err(join_error) => {
            tracing::warn!(engine, error = %join_error, "Decode worker did not finish");
            Attempt::Miss
        },
    }
}

/// Read frames back to back, pausing for the engine's cadence between
/// attempts.
pub(crate) fn live_attempts(track: TrackHandle, decoder: DecoderHandle, formats: Formats) -> impl Stream<Item = Attempt> + Send {
    stream! {
        let cadence = decoder.cadence();
        loop {
            let frame = match track.next_frame().await {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!(track = track.label(), error = %*err, "Capture track lost");
                    yield Attempt::Lost;
                    break;
                },
            };
            yield decode_frame(&decoder, frame, &formats).await;
            if let Some(cadence) = cadence {
                tokio::time::sleep(cadence).await;
            }
        }
    }
}

/// Decode whatever the sampler hands over, one frame at a time.
pub(crate) fn sampled_attempts(
    mut samples: mpsc::Receiver<Sample>,
    decoder: DecoderHandle,
    formats: Formats,
) -> impl Stream<Item = Attempt> + Send {
    stream! {
        while let Some(sample) = samples.recv().await {
            match sample {
                Sample::Frame(frame) => yield decode_frame(&decoder, frame, &formats).await,
                Sample::Lost => {
                    yield Attempt::Lost;
                    break;
                },
            }
        }
    }
}

/// Drain `attempts` into `sink` until the stream ends or `cancel` fires.
///
/// Nothing is emitted once `cancel` has fired.
pub(crate) async fn forward(attempts: impl Stream<Item = Attempt>, sink: EventSink, cancel: CancellationToken) {
    let mut attempts = pin!(attempts);
    loop {
        let attempt = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            attempt = attempts.next() => attempt,
        };
        if cancel.is_cancelled() {
            break;
        }
        match attempt {
            Some(Attempt::Hit(event)) => sink.emit(BackendEvent::Decoded(event)),
            Some(Attempt::Miss) => tracing::trace!("No symbol in frame"),
            Some(Attempt::Lost) => {
                sink.emit(BackendEvent::Fatal(ErrorKind::FatalStreamError));
                break;
            },
            None => break,
        }
    }
}

//! Fixed-window encoding of raw event/time sequences.
//!
//! Pipeline: vocabulary filter (paired) → label codes + scaled times →
//! keep the most recent `N` → left-pad with code `0` / `0.0`.

use std::sync::Arc;

use serde::Serialize;

use crate::artifacts::{TimeScaler, Vocabulary};
use crate::error::PredictionError;

/// Code used for left padding.
pub const PAD_CODE: u32 = 0;
/// Scaled time used for left padding.
pub const PAD_TIME: f64 = 0.0;

/// Model input: two sequences of exactly `window_len` entries each.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedWindow {
    pub codes: Vec<u32>,
    pub times: Vec<f64>,
    /// Number of leading padding slots.
    pub padding: usize,
}

impl EncodedWindow {
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Codes of the real (non-padding) entries, oldest first.
    pub fn real_codes(&self) -> &[u32] {
        &self.codes[self.padding..]
    }
}

/// Encoder bound to a vocabulary, a scaler and a window length.
#[derive(Debug, Clone)]
pub struct WindowEncoder {
    vocabulary: Arc<Vocabulary>,
    scaler: TimeScaler,
    window_len: usize,
}

impl WindowEncoder {
    pub fn new(vocabulary: Arc<Vocabulary>, scaler: TimeScaler, window_len: usize) -> Self {
        Self {
            vocabulary,
            scaler,
            window_len,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Encode index-aligned `events` and `times` into a fixed window.
    ///
    /// Unknown events are dropped together with their elapsed time. Fails
    /// with [`PredictionError::EmptyInput`] when nothing survives.
    pub fn encode<S: AsRef<str>>(
        &self,
        events: &[S],
        times: &[f64],
    ) -> Result<EncodedWindow, PredictionError> {
        if events.len() != times.len() {
            return Err(PredictionError::LengthMismatch {
                events: events.len(),
                times: times.len(),
            });
        }
        if let Some((index, &value)) = times
            .iter()
            .enumerate()
            .find(|(_, t)| !t.is_finite() || **t < 0.0)
        {
            return Err(PredictionError::InvalidElapsedTime { index, value });
        }

        let (codes, scaled): (Vec<u32>, Vec<f64>) = events
            .iter()
            .zip(times)
            .filter_map(|(event, &t)| {
                self.vocabulary
                    .code(event.as_ref())
                    .map(|code| (code, self.scaler.transform(t)))
            })
            .unzip();

        if codes.is_empty() {
            return Err(PredictionError::EmptyInput);
        }

        let (codes, padding) = fit_window(&codes, self.window_len, PAD_CODE);
        let (times, _) = fit_window(&scaled, self.window_len, PAD_TIME);
        Ok(EncodedWindow {
            codes,
            times,
            padding,
        })
    }
}

/// Keep the last `len` items, left-padding with `pad` when short.
/// Returns the window and the number of padding slots.
fn fit_window<T: Copy>(items: &[T], len: usize, pad: T) -> (Vec<T>, usize) {
    if items.len() >= len {
        return (items[items.len() - len..].to_vec(), 0);
    }
    let padding = len - items.len();
    let mut out = Vec::with_capacity(len);
    out.resize(padding, pad);
    out.extend_from_slice(items);
    (out, padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(window_len: usize) -> WindowEncoder {
        let vocab = Vocabulary::from_codes([("click", 1), ("scroll", 2)]).unwrap();
        WindowEncoder::new(Arc::new(vocab), TimeScaler::Identity, window_len)
    }

    #[test]
    fn short_sequence_is_left_padded() {
        let w = encoder(5)
            .encode(&["click", "scroll", "click"], &[1.0, 2.0, 0.5])
            .unwrap();
        assert_eq!(w.codes, vec![0, 0, 1, 2, 1]);
        assert_eq!(w.times, vec![0.0, 0.0, 1.0, 2.0, 0.5]);
        assert_eq!(w.padding, 2);
        assert_eq!(w.real_codes(), &[1, 2, 1]);
    }

    #[test]
    fn long_sequence_keeps_most_recent() {
        let events = ["click", "scroll", "scroll", "click", "scroll"];
        let times = [1.0, 2.0, 3.0, 4.0, 5.0];
        let w = encoder(3).encode(&events, &times).unwrap();
        assert_eq!(w.codes, vec![2, 1, 2]);
        assert_eq!(w.times, vec![3.0, 4.0, 5.0]);
        assert_eq!(w.padding, 0);
    }

    #[test]
    fn unknown_events_drop_their_paired_time() {
        let events = ["click", "hover", "scroll", "zoom"];
        let times = [1.0, 99.0, 2.0, 77.0];
        let w = encoder(4).encode(&events, &times).unwrap();
        assert_eq!(w.codes, vec![0, 0, 1, 2]);
        assert_eq!(w.times, vec![0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn all_unknown_is_empty_input() {
        let err = encoder(4).encode(&["hover", "zoom"], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, PredictionError::EmptyInput));
    }

    #[test]
    fn no_events_is_empty_input() {
        let err = encoder(4).encode::<&str>(&[], &[]).unwrap_err();
        assert!(matches!(err, PredictionError::EmptyInput));
    }

    #[test]
    fn misaligned_sequences_rejected() {
        let err = encoder(4).encode(&["click", "scroll"], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            PredictionError::LengthMismatch { events: 2, times: 1 }
        ));
    }

    #[test]
    fn negative_time_rejected() {
        let err = encoder(4).encode(&["click"], &[-1.0]).unwrap_err();
        assert!(matches!(
            err,
            PredictionError::InvalidElapsedTime { index: 0, .. }
        ));
    }

    #[test]
    fn scaler_applies_to_real_entries_only() {
        let vocab = Vocabulary::from_classes(["a"]).unwrap();
        let enc = WindowEncoder::new(
            Arc::new(vocab),
            TimeScaler::Standard { mean: 1.0, scale: 2.0 },
            3,
        );
        let w = enc.encode(&["a"], &[5.0]).unwrap();
        assert_eq!(w.times, vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn output_length_is_always_window_len() {
        let enc = encoder(6);
        let pool = ["click", "scroll", "other"];
        for n in 1..20 {
            let events: Vec<&str> = (0..n).map(|i| pool[i % 3]).collect();
            let times: Vec<f64> = (0..n).map(|i| i as f64).collect();
            let w = enc.encode(&events, &times).unwrap();
            assert_eq!(w.codes.len(), 6);
            assert_eq!(w.times.len(), 6);
            // Padding strictly on the left.
            assert!(w.codes[..w.padding].iter().all(|&c| c == PAD_CODE));
            assert!(w.real_codes().iter().all(|&c| c != PAD_CODE));
        }
    }

    #[test]
    fn fit_window_exact_length_is_unchanged() {
        let (out, padding) = fit_window(&[1, 2, 3], 3, 0);
        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(padding, 0);
    }
}

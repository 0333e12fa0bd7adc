//! Timestamped usage samples and the bounded retention buffer.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of samples retained for charting.
pub const DEFAULT_SAMPLE_CAP: usize = 50;

/// One retained usage reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    /// Instant the reading was taken.
    pub timestamp: DateTime<Utc>,
    /// Sampled load in kilowatts.
    pub kw: f32,
    /// Display label derived from the timestamp.
    pub label: String,
}

impl UsageSample {
    /// Creates a sample stamped at `timestamp` with an `HH:MM` label.
    pub fn at(timestamp: DateTime<Utc>, kw: f32) -> Self {
        Self {
            timestamp,
            kw,
            label: timestamp.format("%H:%M").to_string(),
        }
    }
}

/// Append-only FIFO ring of usage samples.
///
/// Once `cap` samples are held, each push evicts the oldest sample first.
///
/// # Examples
///
/// ```
/// use homewatt::aggregate::SampleBuffer;
/// use homewatt::aggregate::UsageSample;
/// use chrono::{TimeZone, Utc};
///
/// let mut buffer = SampleBuffer::with_cap(2);
/// let t = Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap();
/// buffer.push(UsageSample::at(t, 1.0));
/// buffer.push(UsageSample::at(t, 2.0));
/// buffer.push(UsageSample::at(t, 3.0));
///
/// assert_eq!(buffer.len(), 2);
/// let kws: Vec<f32> = buffer.iter().map(|s| s.kw).collect();
/// assert_eq!(kws, vec![2.0, 3.0]);
/// ```
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<UsageSample>,
    cap: usize,
}

impl SampleBuffer {
    /// Creates a buffer retaining at most `cap` samples.
    ///
    /// # Panics
    ///
    /// Panics if `cap` is zero.
    pub fn with_cap(cap: usize) -> Self {
        assert!(cap > 0, "sample cap must be > 0");
        Self {
            samples: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Appends a sample, evicting the oldest when the buffer is full.
    pub fn push(&mut self, sample: UsageSample) {
        if self.samples.len() == self.cap {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Iterates samples oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &UsageSample> {
        self.samples.iter()
    }

    /// The most recent sample, if any.
    pub fn latest(&self) -> Option<&UsageSample> {
        self.samples.back()
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when nothing has been sampled yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Configured retention cap.
    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::with_cap(DEFAULT_SAMPLE_CAP)
    }
}

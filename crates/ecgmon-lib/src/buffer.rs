use std::collections::VecDeque;

use crate::{
    error::{EcgError, Result},
    signal::Timestamped,
};

/// Fixed-capacity FIFO of samples with strictly increasing timestamps.
#[derive(Debug, Clone)]
pub struct SampleBuffer<T> {
    samples: VecDeque<T>,
    capacity: usize,
    last_timestamp_ms: Option<f64>,
}

impl<T: Timestamped + Clone> SampleBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::new(),
            capacity,
            last_timestamp_ms: None,
        }
    }

    /// Check whether a sample at `timestamp_ms` would be accepted.
    pub fn check(&self, timestamp_ms: f64) -> Result<()> {
        match self.last_timestamp_ms {
            Some(last) if timestamp_ms <= last => Err(EcgError::OutOfOrderSample {
                timestamp_ms,
                last_timestamp_ms: last,
            }),
            _ => Ok(()),
        }
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: T) -> Result<()> {
        let ts = sample.timestamp_ms();
        self.check(ts)?;
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.last_timestamp_ms = Some(ts);
        Ok(())
    }

    /// Owned copy of the window, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    pub fn last_timestamp_ms(&self) -> Option<f64> {
        self.last_timestamp_ms
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.last_timestamp_ms = None;
    }
}

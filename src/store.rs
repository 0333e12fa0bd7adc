//! Device persistence port.
//!
//! The registry treats the store as an at-least-once, eventually
//! consistent replica: local state may briefly diverge from remote state
//! after a write until the store confirms it. Transient failures are
//! retried with backoff; outright rejections are surfaced so the caller
//! can roll back.

use std::collections::{BTreeMap, HashMap};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::identity::UserId;
use crate::registry::device::{Device, DeviceId};

/// Failures reported by a device store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The store could not be reached; the write may succeed on retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the write; retrying the same payload is futile.
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Returns `true` when the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Keyed document store the registry synchronizes device state with.
pub trait DeviceStore {
    /// Loads every device filed under `user`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the store cannot be read.
    fn load_all(&self, user: &UserId) -> Result<Vec<Device>, StoreError>;

    /// Creates or replaces one device document.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the write is not confirmed.
    fn put(&mut self, user: &UserId, device: &Device) -> Result<(), StoreError>;

    /// Deletes one device document. Deleting an absent id is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the delete is not confirmed.
    fn delete(&mut self, user: &UserId, id: &DeviceId) -> Result<(), StoreError>;
}

/// Bounded retry with linear backoff for transient store failures.
///
/// # Examples
///
/// ```
/// use homewatt::store::{RetryPolicy, StoreError};
///
/// let policy = RetryPolicy::none();
/// let mut calls = 0;
/// let result: Result<u32, StoreError> = policy.run(|| {
///     calls += 1;
///     Ok(7)
/// });
/// assert_eq!(result, Ok(7));
/// assert_eq!(calls, 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first (must be >= 1).
    pub max_attempts: u32,
    /// Sleep between attempts, multiplied by the attempt number.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once with no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Runs `op`, retrying transient failures up to `max_attempts` times.
    ///
    /// Rejections are returned immediately; retrying a payload the store
    /// already refused cannot succeed.
    ///
    /// # Errors
    ///
    /// Returns the last [`StoreError`] once attempts are exhausted.
    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let attempts = self.max_attempts.max(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    debug!(attempt, %err, "transient store failure, retrying");
                    if !self.backoff.is_zero() {
                        thread::sleep(self.backoff * attempt);
                    }
                    last = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        // Unreachable while attempts >= 1, kept total for the compiler.
        Err(last.unwrap_or_else(|| StoreError::Unavailable("no attempts made".into())))
    }
}

/// In-memory reference store with deterministic iteration order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: HashMap<UserId, BTreeMap<DeviceId, Device>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of devices filed under `user`.
    pub fn device_count(&self, user: &UserId) -> usize {
        self.data.get(user).map(BTreeMap::len).unwrap_or(0)
    }

    /// Returns a stored device, if present.
    pub fn get(&self, user: &UserId, id: &DeviceId) -> Option<&Device> {
        self.data.get(user).and_then(|docs| docs.get(id))
    }
}

impl DeviceStore for InMemoryStore {
    fn load_all(&self, user: &UserId) -> Result<Vec<Device>, StoreError> {
        Ok(self
            .data
            .get(user)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    fn put(&mut self, user: &UserId, device: &Device) -> Result<(), StoreError> {
        self.data
            .entry(user.clone())
            .or_default()
            .insert(device.id.clone(), device.clone());
        Ok(())
    }

    fn delete(&mut self, user: &UserId, id: &DeviceId) -> Result<(), StoreError> {
        if let Some(docs) = self.data.get_mut(user) {
            docs.remove(id);
        }
        Ok(())
    }
}

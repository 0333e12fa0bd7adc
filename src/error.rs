//! Error taxonomy for registry mutations and persistence sync.

use thiserror::Error;

use crate::registry::device::DeviceId;
use crate::store::StoreError;

/// Failures surfaced by device registry operations.
///
/// Local computations (trend classification, insight evaluation, series
/// generation) are infallible and never produce these; they yield a
/// neutral or empty result on insufficient data instead.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// The operation referenced a device id the registry does not hold.
    #[error("device \"{0}\" not found")]
    NotFound(DeviceId),

    /// The operation would put a device into an inconsistent state, or the
    /// device carries a malformed usage profile.
    #[error("invalid device state: {0}")]
    InvalidState(String),

    /// A persistence write was not confirmed. In-memory state is rolled
    /// back when the store rejected the write outright, and kept (as a
    /// briefly diverged replica) when the store was merely unreachable.
    #[error("sync failure: {0}")]
    Sync(#[from] StoreError),
}

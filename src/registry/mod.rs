//! Device registry component.

/// Device model and category set.
pub mod device;
/// Registry service with persistence sync.
pub mod registry;

// Re-export the main types for convenience
pub use device::{Device, DeviceCategory, DeviceId};
pub use registry::{DeviceRegistry, FAVORITES_CAP};

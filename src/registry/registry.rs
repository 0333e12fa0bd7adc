//! Device registry: the source of truth for active load.
//!
//! Mutations apply to in-memory state first and are then pushed through
//! the persistence port. A rejected write rolls the local mutation back;
//! an unreachable store leaves the optimistic state in place (briefly
//! diverged replica) and surfaces the failure to the caller.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::Error;
use crate::identity::IdentityProvider;
use crate::registry::device::{Device, DeviceId};
use crate::store::{DeviceStore, RetryPolicy, StoreError};

/// Maximum number of devices shown in the favorites view.
pub const FAVORITES_CAP: usize = 8;

/// Registry of controllable devices, generic over the persistence store.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use homewatt::clock::{Clock, ManualClock};
/// use homewatt::identity::StaticIdentity;
/// use homewatt::registry::{Device, DeviceCategory, DeviceRegistry};
/// use homewatt::store::InMemoryStore;
///
/// let clock = Arc::new(ManualClock::starting_at_ymd_hms(2025, 7, 1, 8, 0, 0));
/// let mut registry = DeviceRegistry::new(
///     InMemoryStore::new(),
///     Arc::new(StaticIdentity::signed_in("demo")),
///     clock.clone(),
/// );
///
/// let draft = Device::new("Desk Lamp", "Office", DeviceCategory::Lighting, 40.0, clock.now());
/// let id = registry.register(draft)?;
/// assert!(registry.toggle(&id)?);
/// assert_eq!(registry.get(&id).map(|d| d.current_usage_w), Some(40.0));
/// # Ok::<(), homewatt::error::Error>(())
/// ```
pub struct DeviceRegistry<S: DeviceStore> {
    devices: Vec<Device>,
    store: S,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    next_id: u32,
}

impl<S: DeviceStore> DeviceRegistry<S> {
    /// Creates an empty registry with the default retry policy.
    pub fn new(store: S, identity: Arc<dyn IdentityProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            devices: Vec::new(),
            store,
            identity,
            clock,
            retry: RetryPolicy::default(),
            next_id: 1,
        }
    }

    /// Replaces the retry policy used for store writes.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Adds a device, assigning a generated id when the draft carries none.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] for a malformed usage profile, an
    ///   off-device with non-zero draw, or an explicit id that is already
    ///   registered.
    /// * [`Error::Sync`] when the store does not confirm the write; the
    ///   device is removed again if the store rejected it outright.
    pub fn register(&mut self, mut device: Device) -> Result<DeviceId, Error> {
        if !device.usage_profile_ok() {
            return Err(Error::InvalidState(format!(
                "device \"{}\" has a malformed usage profile",
                device.name
            )));
        }
        if !device.state_consistent() {
            return Err(Error::InvalidState(format!(
                "device \"{}\" is off but reports {} W",
                device.name, device.current_usage_w
            )));
        }
        if device.id.is_unassigned() {
            device.id = self.generate_id();
        } else if self.contains(&device.id) {
            return Err(Error::InvalidState(format!(
                "device id \"{}\" is already registered",
                device.id
            )));
        }
        device.last_updated = self.clock.now();

        let id = device.id.clone();
        self.devices.push(device.clone());
        if let Err(err) = self.persist_put(&device) {
            if rolls_back(&err) {
                self.devices.pop();
            }
            return Err(err);
        }
        Ok(id)
    }

    /// Flips a device's power state and returns the new state.
    ///
    /// Turning on sets `current_usage_w` to the device's average draw;
    /// turning off sets it to zero.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`] for an unknown id.
    /// * [`Error::InvalidState`] for a malformed usage profile.
    /// * [`Error::Sync`] when the store does not confirm the write; the
    ///   prior state is restored if the store rejected it outright.
    pub fn toggle(&mut self, id: &DeviceId) -> Result<bool, Error> {
        let now = self.clock.now();
        let idx = self
            .index_of(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        if !self.devices[idx].usage_profile_ok() {
            return Err(Error::InvalidState(format!(
                "device \"{id}\" has a malformed usage profile"
            )));
        }

        let prior = self.devices[idx].clone();
        {
            let device = &mut self.devices[idx];
            device.is_on = !device.is_on;
            device.current_usage_w = if device.is_on {
                device.average_usage_w
            } else {
                0.0
            };
            device.last_updated = now;
        }

        let updated = self.devices[idx].clone();
        match self.persist_put(&updated) {
            Ok(()) => Ok(updated.is_on),
            Err(err) => {
                if rolls_back(&err) {
                    self.devices[idx] = prior;
                }
                Err(err)
            }
        }
    }

    /// Replaces every field of a registered device by id.
    ///
    /// The passed device is stored verbatim, so a subsequent read returns
    /// a value equal in all fields.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`] for an unknown id.
    /// * [`Error::InvalidState`] for a malformed profile or an off-device
    ///   with non-zero draw.
    /// * [`Error::Sync`] when the store does not confirm the write; the
    ///   prior value is restored if the store rejected it outright.
    pub fn update(&mut self, device: Device) -> Result<(), Error> {
        let idx = self
            .index_of(&device.id)
            .ok_or_else(|| Error::NotFound(device.id.clone()))?;
        if !device.usage_profile_ok() {
            return Err(Error::InvalidState(format!(
                "device \"{}\" has a malformed usage profile",
                device.id
            )));
        }
        if !device.state_consistent() {
            return Err(Error::InvalidState(format!(
                "device \"{}\" is off but reports {} W",
                device.id, device.current_usage_w
            )));
        }

        let prior = std::mem::replace(&mut self.devices[idx], device.clone());
        match self.persist_put(&device) {
            Ok(()) => Ok(()),
            Err(err) => {
                if rolls_back(&err) {
                    self.devices[idx] = prior;
                }
                Err(err)
            }
        }
    }

    /// Deletes a device and returns it.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`] for an unknown id.
    /// * [`Error::Sync`] when the store does not confirm the delete; the
    ///   device is reinserted at its original position if the store
    ///   rejected it outright.
    pub fn remove(&mut self, id: &DeviceId) -> Result<Device, Error> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        let removed = self.devices.remove(idx);
        match self.persist_delete(id) {
            Ok(()) => Ok(removed),
            Err(err) => {
                if rolls_back(&err) {
                    self.devices.insert(idx, removed);
                }
                Err(err)
            }
        }
    }

    /// Favorites view: devices with the favorite flag, registry order,
    /// capped at [`FAVORITES_CAP`].
    pub fn favorites(&self) -> Vec<&Device> {
        self.devices
            .iter()
            .filter(|d| d.is_favorite)
            .take(FAVORITES_CAP)
            .collect()
    }

    /// Cloned snapshot of all devices, in registration order.
    ///
    /// The aggregator reads through this so a tick never observes a
    /// device mid-mutation.
    pub fn devices(&self) -> Vec<Device> {
        self.devices.clone()
    }

    /// Looks up a device by id.
    pub fn get(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| &d.id == id)
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` when no devices are registered.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Populates the registry from the persistence store at startup.
    ///
    /// Returns the number of devices loaded. Without a signed-in user the
    /// registry stays as it is and `0` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sync`] when the store cannot be read.
    pub fn load_from_store(&mut self) -> Result<usize, Error> {
        let Some(user) = self.identity.user_id() else {
            debug!("no signed-in user, keeping local registry state");
            return Ok(0);
        };
        let retry = self.retry;
        let store = &self.store;
        let devices = retry.run(|| store.load_all(&user)).map_err(Error::Sync)?;
        let count = devices.len();
        self.install(devices);
        Ok(count)
    }

    /// Replaces local state with a remote change notification.
    pub fn apply_remote(&mut self, devices: Vec<Device>) {
        debug!(count = devices.len(), "applying remote device snapshot");
        self.install(devices);
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn install(&mut self, devices: Vec<Device>) {
        for device in &devices {
            if let Some(n) = device
                .id
                .as_str()
                .strip_prefix("dev-")
                .and_then(|s| s.parse::<u32>().ok())
            {
                self.next_id = self.next_id.max(n + 1);
            }
        }
        self.devices = devices;
    }

    fn contains(&self, id: &DeviceId) -> bool {
        self.devices.iter().any(|d| &d.id == id)
    }

    fn index_of(&self, id: &DeviceId) -> Option<usize> {
        self.devices.iter().position(|d| &d.id == id)
    }

    fn generate_id(&mut self) -> DeviceId {
        loop {
            let candidate = DeviceId::new(format!("dev-{:04}", self.next_id));
            self.next_id = self.next_id.wrapping_add(1);
            if !self.contains(&candidate) {
                return candidate;
            }
        }
    }

    fn persist_put(&mut self, device: &Device) -> Result<(), Error> {
        let Some(user) = self.identity.user_id() else {
            debug!(device = %device.id, "no signed-in user, skipping store write");
            return Ok(());
        };
        let retry = self.retry;
        let store = &mut self.store;
        retry.run(|| store.put(&user, device)).map_err(|err| {
            warn!(device = %device.id, %err, "store write not confirmed");
            Error::Sync(err)
        })
    }

    fn persist_delete(&mut self, id: &DeviceId) -> Result<(), Error> {
        let Some(user) = self.identity.user_id() else {
            debug!(device = %id, "no signed-in user, skipping store delete");
            return Ok(());
        };
        let retry = self.retry;
        let store = &mut self.store;
        retry.run(|| store.delete(&user, id)).map_err(|err| {
            warn!(device = %id, %err, "store delete not confirmed");
            Error::Sync(err)
        })
    }
}

/// A rejected write rolls local state back; an unreachable store keeps the
/// optimistic mutation.
fn rolls_back(err: &Error) -> bool {
    matches!(err, Error::Sync(StoreError::Rejected(_)))
}

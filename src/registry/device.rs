//! Device model shared by the registry, aggregator, and insight rules.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable unique identifier of a registered device.
///
/// Registry-generated ids look like `dev-0001`. An empty id marks a draft
/// that has not been registered yet; [`DeviceId::is_unassigned`] checks for
/// that state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wraps a raw id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// An id placeholder for a device awaiting registration.
    pub fn unassigned() -> Self {
        Self(String::new())
    }

    /// Returns `true` when no id has been assigned yet.
    pub fn is_unassigned(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed set of controllable load categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    Lighting,
    Heating,
    Cooling,
    Appliances,
    Electronics,
    Security,
}

impl DeviceCategory {
    /// All categories, in display order.
    pub const ALL: &[DeviceCategory] = &[
        DeviceCategory::Lighting,
        DeviceCategory::Heating,
        DeviceCategory::Cooling,
        DeviceCategory::Appliances,
        DeviceCategory::Electronics,
        DeviceCategory::Security,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            DeviceCategory::Lighting => "Lighting",
            DeviceCategory::Heating => "Heating",
            DeviceCategory::Cooling => "Cooling",
            DeviceCategory::Appliances => "Appliances",
            DeviceCategory::Electronics => "Electronics",
            DeviceCategory::Security => "Security",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A controllable load with on/off state and power draw.
///
/// Invariant: `current_usage_w` is `0.0` whenever `is_on` is `false`, and
/// is set to `average_usage_w` when the device is switched on.
///
/// # Examples
///
/// ```
/// use homewatt::registry::{Device, DeviceCategory};
/// use chrono::{TimeZone, Utc};
///
/// let now = Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap();
/// let lamp = Device::new("Desk Lamp", "Office", DeviceCategory::Lighting, 40.0, now);
/// assert!(!lamp.is_on);
/// assert_eq!(lamp.current_usage_w, 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable unique id, assigned at registration.
    pub id: DeviceId,
    /// Display name.
    pub name: String,
    /// Room the device is installed in.
    pub room: String,
    /// Load category, used by insight rules.
    pub category: DeviceCategory,
    /// Power state.
    pub is_on: bool,
    /// Instantaneous draw in watts; zero while the device is off.
    pub current_usage_w: f32,
    /// Energy consumed today (kWh).
    pub today_kwh: f32,
    /// Energy consumed this week (kWh).
    pub week_kwh: f32,
    /// Energy consumed this month (kWh).
    pub month_kwh: f32,
    /// Typical draw while on (watts).
    pub average_usage_w: f32,
    /// Highest observed draw (watts).
    pub peak_usage_w: f32,
    /// Pinned to the favorites strip.
    pub is_favorite: bool,
    /// Hours the device has been on today.
    pub on_time_today_h: f32,
    /// Timestamp of the last mutation, from the injected clock.
    pub last_updated: DateTime<Utc>,
}

impl Device {
    /// Creates a switched-off device draft with no id assigned.
    pub fn new(
        name: impl Into<String>,
        room: impl Into<String>,
        category: DeviceCategory,
        average_usage_w: f32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DeviceId::unassigned(),
            name: name.into(),
            room: room.into(),
            category,
            is_on: false,
            current_usage_w: 0.0,
            today_kwh: 0.0,
            week_kwh: 0.0,
            month_kwh: 0.0,
            average_usage_w,
            peak_usage_w: average_usage_w,
            is_favorite: false,
            on_time_today_h: 0.0,
            last_updated: now,
        }
    }

    /// Returns `true` when the usage profile can drive toggle side effects.
    ///
    /// A malformed profile (negative or non-finite draw figures) must not
    /// be copied into `current_usage_w`.
    pub fn usage_profile_ok(&self) -> bool {
        self.average_usage_w.is_finite()
            && self.average_usage_w >= 0.0
            && self.current_usage_w.is_finite()
            && self.current_usage_w >= 0.0
    }

    /// Returns `true` when the on/off state and draw agree.
    pub fn state_consistent(&self) -> bool {
        self.is_on || self.current_usage_w == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn new_device_starts_off_and_dark() {
        let device = Device::new("Heater", "Bedroom", DeviceCategory::Heating, 1200.0, now());
        assert!(device.id.is_unassigned());
        assert!(!device.is_on);
        assert_eq!(device.current_usage_w, 0.0);
        assert!(device.state_consistent());
    }

    #[test]
    fn malformed_profile_is_detected() {
        let mut device = Device::new("TV", "Living Room", DeviceCategory::Electronics, 90.0, now());
        assert!(device.usage_profile_ok());

        device.average_usage_w = -5.0;
        assert!(!device.usage_profile_ok());

        device.average_usage_w = f32::NAN;
        assert!(!device.usage_profile_ok());
    }

    #[test]
    fn off_device_with_draw_is_inconsistent() {
        let mut device = Device::new("Fan", "Office", DeviceCategory::Cooling, 45.0, now());
        device.current_usage_w = 45.0;
        assert!(!device.state_consistent());

        device.is_on = true;
        assert!(device.state_consistent());
    }

    #[test]
    fn category_labels_cover_every_variant() {
        for category in DeviceCategory::ALL {
            assert!(!category.label().is_empty());
        }
        assert_eq!(DeviceCategory::Cooling.to_string(), "Cooling");
    }
}

//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::aggregate::aggregator::AggregatorSettings;
use crate::aggregate::load::{LoadModel, MeterFeed, Passthrough, SeededJitter};
use crate::registry::device::{Device, DeviceCategory};

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the `demo_home` scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::from_preset`] for a built-in scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Aggregation cadence, pricing, and load-model parameters.
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    /// Signed-in user for persistence sync.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Devices seeded into the registry at startup.
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

/// Aggregation cadence, pricing, and load-model parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregatorConfig {
    /// Seconds between aggregation ticks (must be > 0).
    pub tick_seconds: u32,
    /// Maximum retained samples (must be > 0).
    pub sample_cap: usize,
    /// Price per kWh.
    pub rate_per_kwh: f32,
    /// Series weight for off-devices (0.0 to 1.0).
    pub idle_weight: f32,
    /// Baseline grid draw for avoided-energy accounting (kW).
    pub baseline_kw: f32,
    /// Grid carbon intensity (kg CO2 per kWh).
    pub co2_kg_per_kwh: f32,
    /// Load model: `"seeded"`, `"passthrough"`, or `"metered"`.
    pub load_model: String,
    /// Gaussian noise level for the seeded model (kW).
    pub noise_std_kw: f32,
    /// Master random seed.
    pub seed: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 5,
            sample_cap: 50,
            rate_per_kwh: 0.12,
            idle_weight: 0.3,
            baseline_kw: 3.0,
            co2_kg_per_kwh: 0.4,
            load_model: "seeded".to_string(),
            noise_std_kw: 0.25,
            seed: 42,
        }
    }
}

impl AggregatorConfig {
    /// Valid load-model names.
    pub const LOAD_MODELS: &[&str] = &["seeded", "passthrough", "metered"];

    /// Maps this config onto aggregator settings.
    pub fn settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            tick_seconds: self.tick_seconds,
            sample_cap: self.sample_cap,
            rate_per_kwh: self.rate_per_kwh,
            idle_weight: self.idle_weight,
            baseline_kw: self.baseline_kw,
            co2_kg_per_kwh: self.co2_kg_per_kwh,
        }
    }

    /// Builds the configured load strategy.
    ///
    /// Unknown names fall back to `passthrough`; `validate()` reports them
    /// before a scenario gets this far.
    pub fn build_load_model(&self) -> Box<dyn LoadModel> {
        match self.load_model.as_str() {
            "seeded" => Box::new(SeededJitter::new(self.noise_std_kw, self.seed)),
            "metered" => Box::new(MeterFeed::new()),
            _ => Box::new(Passthrough),
        }
    }
}

/// Signed-in user for persistence sync.
///
/// An empty user string runs the registry local-only (no store traffic).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// User id the device store is keyed by.
    pub user: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user: "demo-user".to_string(),
        }
    }
}

/// One device seeded into the registry at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Display name.
    pub name: String,
    /// Room the device is installed in.
    pub room: String,
    /// Load category.
    pub category: DeviceCategory,
    /// Typical draw while on (watts, must be > 0).
    pub average_usage_w: f32,
    /// Highest observed draw (watts); derived from the average when 0.
    #[serde(default)]
    pub peak_usage_w: f32,
    /// Start switched on.
    #[serde(default)]
    pub is_on: bool,
    /// Pin to the favorites strip.
    #[serde(default)]
    pub is_favorite: bool,
    /// Hours already on today.
    #[serde(default)]
    pub on_time_today_h: f32,
    /// Energy consumed today (kWh).
    #[serde(default)]
    pub today_kwh: f32,
    /// Energy consumed this week (kWh).
    #[serde(default)]
    pub week_kwh: f32,
    /// Energy consumed this month (kWh).
    #[serde(default)]
    pub month_kwh: f32,
}

impl DeviceConfig {
    /// Builds the registry draft described by this entry.
    pub fn build(&self, now: DateTime<Utc>) -> Device {
        let mut device = Device::new(
            self.name.clone(),
            self.room.clone(),
            self.category,
            self.average_usage_w,
            now,
        );
        device.peak_usage_w = if self.peak_usage_w > 0.0 {
            self.peak_usage_w
        } else {
            self.average_usage_w * 1.5
        };
        device.is_favorite = self.is_favorite;
        device.on_time_today_h = self.on_time_today_h;
        device.today_kwh = self.today_kwh;
        device.week_kwh = self.week_kwh;
        device.month_kwh = self.month_kwh;
        if self.is_on {
            device.is_on = true;
            device.current_usage_w = self.average_usage_w;
        }
        device
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"aggregator.tick_seconds"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

fn seed_device(
    name: &str,
    room: &str,
    category: DeviceCategory,
    average_usage_w: f32,
) -> DeviceConfig {
    DeviceConfig {
        name: name.to_string(),
        room: room.to_string(),
        category,
        average_usage_w,
        peak_usage_w: 0.0,
        is_on: false,
        is_favorite: false,
        on_time_today_h: 0.0,
        today_kwh: 0.0,
        week_kwh: 0.0,
        month_kwh: 0.0,
    }
}

impl ScenarioConfig {
    /// Returns the demo-home scenario: a ten-device household with a few
    /// loads already running.
    pub fn demo_home() -> Self {
        let devices = vec![
            DeviceConfig {
                is_on: true,
                is_favorite: true,
                on_time_today_h: 4.5,
                today_kwh: 0.3,
                week_kwh: 2.1,
                month_kwh: 8.4,
                ..seed_device(
                    "Living Room Light",
                    "Living Room",
                    DeviceCategory::Lighting,
                    60.0,
                )
            },
            DeviceConfig {
                is_on: true,
                is_favorite: true,
                on_time_today_h: 3.0,
                today_kwh: 0.4,
                week_kwh: 3.2,
                month_kwh: 13.5,
                ..seed_device("Smart TV", "Living Room", DeviceCategory::Electronics, 120.0)
            },
            DeviceConfig {
                peak_usage_w: 2400.0,
                is_on: true,
                is_favorite: true,
                on_time_today_h: 7.5,
                today_kwh: 9.0,
                week_kwh: 52.0,
                month_kwh: 210.0,
                ..seed_device(
                    "Air Conditioner",
                    "Living Room",
                    DeviceCategory::Cooling,
                    1800.0,
                )
            },
            DeviceConfig {
                today_kwh: 0.1,
                week_kwh: 1.2,
                month_kwh: 4.8,
                ..seed_device("Kitchen Light", "Kitchen", DeviceCategory::Lighting, 60.0)
            },
            DeviceConfig {
                is_on: true,
                is_favorite: true,
                on_time_today_h: 12.0,
                today_kwh: 1.8,
                week_kwh: 12.6,
                month_kwh: 54.0,
                ..seed_device("Refrigerator", "Kitchen", DeviceCategory::Appliances, 150.0)
            },
            DeviceConfig {
                peak_usage_w: 1800.0,
                week_kwh: 4.5,
                month_kwh: 19.0,
                ..seed_device("Dishwasher", "Kitchen", DeviceCategory::Appliances, 1200.0)
            },
            DeviceConfig {
                today_kwh: 0.1,
                week_kwh: 0.8,
                month_kwh: 3.2,
                ..seed_device("Bedroom Light", "Bedroom", DeviceCategory::Lighting, 40.0)
            },
            DeviceConfig {
                peak_usage_w: 2000.0,
                week_kwh: 10.5,
                month_kwh: 44.0,
                ..seed_device("Smart Heater", "Bedroom", DeviceCategory::Heating, 1500.0)
            },
            DeviceConfig {
                is_on: true,
                on_time_today_h: 6.0,
                today_kwh: 2.1,
                week_kwh: 11.0,
                month_kwh: 46.0,
                ..seed_device(
                    "Desktop Computer",
                    "Office",
                    DeviceCategory::Electronics,
                    350.0,
                )
            },
            DeviceConfig {
                is_on: true,
                on_time_today_h: 12.0,
                today_kwh: 0.1,
                week_kwh: 0.7,
                month_kwh: 2.9,
                ..seed_device("Security Camera", "Garage", DeviceCategory::Security, 8.0)
            },
        ];

        Self {
            aggregator: AggregatorConfig::default(),
            identity: IdentityConfig::default(),
            devices,
        }
    }

    /// Returns the eco-studio preset: a small flat with modest loads and
    /// a deterministic load model.
    pub fn eco_studio() -> Self {
        let devices = vec![
            DeviceConfig {
                is_on: true,
                is_favorite: true,
                on_time_today_h: 2.0,
                today_kwh: 0.1,
                week_kwh: 0.9,
                month_kwh: 3.6,
                ..seed_device("Ceiling Light", "Studio", DeviceCategory::Lighting, 30.0)
            },
            DeviceConfig {
                is_on: true,
                on_time_today_h: 12.0,
                today_kwh: 1.2,
                week_kwh: 8.4,
                month_kwh: 36.0,
                ..seed_device("Fridge", "Studio", DeviceCategory::Appliances, 100.0)
            },
            DeviceConfig {
                is_favorite: true,
                week_kwh: 2.0,
                month_kwh: 8.5,
                ..seed_device("Laptop Dock", "Studio", DeviceCategory::Electronics, 65.0)
            },
            DeviceConfig {
                week_kwh: 1.1,
                month_kwh: 4.4,
                ..seed_device("Door Sensor Hub", "Entry", DeviceCategory::Security, 5.0)
            },
        ];

        Self {
            aggregator: AggregatorConfig {
                load_model: "passthrough".to_string(),
                baseline_kw: 1.5,
                ..AggregatorConfig::default()
            },
            identity: IdentityConfig::default(),
            devices,
        }
    }

    /// Returns the empty preset: no seed devices, local-only identity.
    pub fn empty() -> Self {
        Self {
            aggregator: AggregatorConfig {
                load_model: "passthrough".to_string(),
                ..AggregatorConfig::default()
            },
            identity: IdentityConfig {
                user: String::new(),
            },
            devices: Vec::new(),
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["demo_home", "eco_studio", "empty"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "demo_home" => Ok(Self::demo_home()),
            "eco_studio" => Ok(Self::eco_studio()),
            "empty" => Ok(Self::empty()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let a = &self.aggregator;

        if a.tick_seconds == 0 {
            errors.push(ConfigError {
                field: "aggregator.tick_seconds".into(),
                message: "must be > 0".into(),
            });
        }
        if a.sample_cap == 0 {
            errors.push(ConfigError {
                field: "aggregator.sample_cap".into(),
                message: "must be > 0".into(),
            });
        }
        if a.rate_per_kwh < 0.0 {
            errors.push(ConfigError {
                field: "aggregator.rate_per_kwh".into(),
                message: "must be >= 0".into(),
            });
        }
        if !(0.0..=1.0).contains(&a.idle_weight) {
            errors.push(ConfigError {
                field: "aggregator.idle_weight".into(),
                message: "must be in [0.0, 1.0]".into(),
            });
        }
        if a.baseline_kw < 0.0 {
            errors.push(ConfigError {
                field: "aggregator.baseline_kw".into(),
                message: "must be >= 0".into(),
            });
        }
        if a.co2_kg_per_kwh < 0.0 {
            errors.push(ConfigError {
                field: "aggregator.co2_kg_per_kwh".into(),
                message: "must be >= 0".into(),
            });
        }
        if a.noise_std_kw < 0.0 {
            errors.push(ConfigError {
                field: "aggregator.noise_std_kw".into(),
                message: "must be >= 0".into(),
            });
        }
        if !AggregatorConfig::LOAD_MODELS.contains(&a.load_model.as_str()) {
            errors.push(ConfigError {
                field: "aggregator.load_model".into(),
                message: format!(
                    "must be one of {}, got \"{}\"",
                    AggregatorConfig::LOAD_MODELS.join(", "),
                    a.load_model
                ),
            });
        }

        for (i, d) in self.devices.iter().enumerate() {
            if d.name.trim().is_empty() {
                errors.push(ConfigError {
                    field: format!("device[{i}].name"),
                    message: "must not be empty".into(),
                });
            }
            if !(d.average_usage_w.is_finite() && d.average_usage_w > 0.0) {
                errors.push(ConfigError {
                    field: format!("device[{i}].average_usage_w"),
                    message: "must be > 0".into(),
                });
            }
            if d.peak_usage_w > 0.0 && d.peak_usage_w < d.average_usage_w {
                errors.push(ConfigError {
                    field: format!("device[{i}].peak_usage_w"),
                    message: "must be >= average_usage_w".into(),
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_home_preset_valid() {
        let cfg = ScenarioConfig::demo_home();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "demo_home should be valid: {errors:?}");
        assert_eq!(cfg.devices.len(), 10);
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.err();
        assert!(e.is_some_and(|e| e.message.contains("unknown preset")));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[aggregator]
tick_seconds = 10
sample_cap = 30
rate_per_kwh = 0.15
idle_weight = 0.2
baseline_kw = 2.5
co2_kg_per_kwh = 0.35
load_model = "passthrough"
noise_std_kw = 0.0
seed = 99

[identity]
user = "house-7"

[[device]]
name = "Hall Light"
room = "Hall"
category = "lighting"
average_usage_w = 45.0
is_on = true
is_favorite = true
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.aggregator.tick_seconds), Some(10));
        assert_eq!(
            cfg.as_ref().map(|c| c.identity.user.as_str()),
            Some("house-7")
        );
        assert_eq!(cfg.as_ref().map(|c| c.devices.len()), Some(1));
        assert_eq!(
            cfg.as_ref().map(|c| c.devices[0].category),
            Some(DeviceCategory::Lighting)
        );
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[aggregator]
tick_seconds = 5
bogus_field = true
"#;
        let result = ScenarioConfig::from_toml_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[aggregator]
seed = 99
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok());
        let cfg = cfg.ok();
        // seed overridden
        assert_eq!(cfg.as_ref().map(|c| c.aggregator.seed), Some(99));
        // cadence kept default
        assert_eq!(cfg.as_ref().map(|c| c.aggregator.tick_seconds), Some(5));
        // no devices seeded
        assert_eq!(cfg.as_ref().map(|c| c.devices.len()), Some(0));
    }

    #[test]
    fn validation_catches_zero_tick() {
        let mut cfg = ScenarioConfig::demo_home();
        cfg.aggregator.tick_seconds = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "aggregator.tick_seconds"));
    }

    #[test]
    fn validation_catches_bad_idle_weight() {
        let mut cfg = ScenarioConfig::demo_home();
        cfg.aggregator.idle_weight = 1.5;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "aggregator.idle_weight"));
    }

    #[test]
    fn validation_catches_bad_load_model() {
        let mut cfg = ScenarioConfig::demo_home();
        cfg.aggregator.load_model = "bogus".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "aggregator.load_model"));
    }

    #[test]
    fn validation_catches_peak_below_average() {
        let mut cfg = ScenarioConfig::demo_home();
        cfg.devices[0].peak_usage_w = 1.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field.ends_with("peak_usage_w")));
    }

    #[test]
    fn device_build_applies_on_state() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap();
        let cfg = ScenarioConfig::demo_home();

        let ac = cfg.devices[2].build(now);
        assert_eq!(ac.name, "Air Conditioner");
        assert!(ac.is_on);
        assert_eq!(ac.current_usage_w, 1800.0);
        assert_eq!(ac.peak_usage_w, 2400.0);

        let dishwasher = cfg.devices[5].build(now);
        assert!(!dishwasher.is_on);
        assert_eq!(dishwasher.current_usage_w, 0.0);
    }

    #[test]
    fn derived_peak_falls_back_to_scaled_average() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap();
        let entry = seed_device("Lamp", "Hall", DeviceCategory::Lighting, 100.0);
        let device = entry.build(now);
        assert_eq!(device.peak_usage_w, 150.0);
    }

    #[test]
    fn load_model_builders_match_names() {
        let mut cfg = AggregatorConfig::default();
        cfg.load_model = "passthrough".into();
        let mut model = cfg.build_load_model();
        assert_eq!(model.sample_kw(2.0), 2.0);

        cfg.load_model = "seeded".into();
        cfg.noise_std_kw = 0.0;
        let mut seeded = cfg.build_load_model();
        assert_eq!(seeded.sample_kw(2.0), 2.0);
    }
}

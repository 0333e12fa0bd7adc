//! Tick-driven usage aggregation: sampling, cost, rolling totals, trends.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::aggregate::load::LoadModel;
use crate::aggregate::sample::{DEFAULT_SAMPLE_CAP, SampleBuffer, UsageSample};
use crate::aggregate::series::{DEFAULT_IDLE_WEIGHT, UsagePeriod, UsageSeries};
use crate::aggregate::trend::{TREND_EPSILON, TrendDirection, classify_trend};
use crate::clock::Clock;
use crate::registry::device::Device;

/// Aggregation parameters, fixed at construction.
///
/// # Examples
///
/// ```
/// use homewatt::aggregate::AggregatorSettings;
///
/// let settings = AggregatorSettings::default();
/// assert_eq!(settings.tick_seconds, 5);
/// assert_eq!(settings.sample_cap, 50);
/// assert_eq!(settings.rate_per_kwh, 0.12);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    /// Seconds between aggregation ticks.
    pub tick_seconds: u32,
    /// Maximum samples retained for charting.
    pub sample_cap: usize,
    /// Price per kilowatt-hour.
    pub rate_per_kwh: f32,
    /// Series weight for devices that are currently off.
    pub idle_weight: f32,
    /// Reference grid draw used for avoided-energy accounting (kW).
    pub baseline_kw: f32,
    /// Grid carbon intensity (kg CO2 per kWh).
    pub co2_kg_per_kwh: f32,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            tick_seconds: 5,
            sample_cap: DEFAULT_SAMPLE_CAP,
            rate_per_kwh: 0.12,
            idle_weight: DEFAULT_IDLE_WEIGHT,
            baseline_kw: 3.0,
            co2_kg_per_kwh: 0.4,
        }
    }
}

impl AggregatorSettings {
    /// Duration of one tick in hours.
    pub fn dt_hours(&self) -> f32 {
        self.tick_seconds as f32 / 3600.0
    }
}

/// A metric value paired with its direction of change since the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricReading {
    pub value: f32,
    pub trend: TrendDirection,
}

/// Derived dashboard figures, recomputed every tick and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    /// Instant the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Sampled household load (kW).
    pub current_usage: MetricReading,
    /// Cost of today's retained samples at the configured rate.
    pub todays_cost: MetricReading,
    /// Energy accumulated in the current calendar month (kWh).
    pub monthly_usage: MetricReading,
    /// Avoided emissions this month versus the baseline draw (kg CO2).
    pub co2_saved: MetricReading,
}

impl std::fmt::Display for AggregateSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | load={:.2} kW ({}) | cost today={:.2} ({}) | \
             month={:.2} kWh ({}) | co2 saved={:.2} kg ({})",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.current_usage.value,
            self.current_usage.trend,
            self.todays_cost.value,
            self.todays_cost.trend,
            self.monthly_usage.value,
            self.monthly_usage.trend,
            self.co2_saved.value,
            self.co2_saved.trend,
        )
    }
}

/// Sums the draw of all on-devices and converts watts to kilowatts.
pub fn active_load_kw(devices: &[Device]) -> f32 {
    devices
        .iter()
        .filter(|d| d.is_on)
        .map(|d| d.current_usage_w)
        .sum::<f32>()
        / 1000.0
}

/// Tick-driven aggregator over registry snapshots.
///
/// Owns the bounded sample buffer, the dated daily energy totals, and the
/// previous readings used for trend classification. The load strategy and
/// clock are injected so runs are deterministic under test.
pub struct UsageAggregator {
    settings: AggregatorSettings,
    load_model: Box<dyn LoadModel>,
    clock: Arc<dyn Clock>,
    samples: SampleBuffer,
    daily_kwh: BTreeMap<NaiveDate, f32>,
    daily_avoided_kwh: BTreeMap<NaiveDate, f32>,
    previous: Option<AggregateSnapshot>,
    ticks: usize,
}

impl UsageAggregator {
    /// Creates an aggregator with the given settings, strategy, and clock.
    ///
    /// # Panics
    ///
    /// Panics if `settings.sample_cap` is zero or `settings.tick_seconds`
    /// is zero.
    pub fn new(
        settings: AggregatorSettings,
        load_model: Box<dyn LoadModel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        assert!(settings.tick_seconds > 0, "tick_seconds must be > 0");
        Self {
            samples: SampleBuffer::with_cap(settings.sample_cap),
            settings,
            load_model,
            clock,
            daily_kwh: BTreeMap::new(),
            daily_avoided_kwh: BTreeMap::new(),
            previous: None,
            ticks: 0,
        }
    }

    /// Executes one aggregation tick over a registry snapshot.
    ///
    /// Appends one sample, updates the dated energy totals, and returns
    /// the refreshed snapshot with per-metric trends against the previous
    /// tick.
    pub fn tick(&mut self, devices: &[Device]) -> AggregateSnapshot {
        let now = self.clock.now();
        let day = now.date_naive();
        let dt_h = self.settings.dt_hours();

        let registry_kw = active_load_kw(devices);
        let kw = self.load_model.sample_kw(registry_kw).max(0.0);
        self.samples.push(UsageSample::at(now, kw));

        *self.daily_kwh.entry(day).or_insert(0.0) += kw * dt_h;
        let avoided_kwh = (self.settings.baseline_kw - kw).max(0.0) * dt_h;
        *self.daily_avoided_kwh.entry(day).or_insert(0.0) += avoided_kwh;
        self.prune_other_months(day);

        let usage = kw;
        let cost = self.todays_cost_on(day);
        let monthly = self.daily_kwh.values().sum::<f32>();
        let co2 = self.daily_avoided_kwh.values().sum::<f32>() * self.settings.co2_kg_per_kwh;

        let snapshot = AggregateSnapshot {
            timestamp: now,
            current_usage: self.reading(usage, |p| p.current_usage.value),
            todays_cost: self.reading(cost, |p| p.todays_cost.value),
            monthly_usage: self.reading(monthly, |p| p.monthly_usage.value),
            co2_saved: self.reading(co2, |p| p.co2_saved.value),
        };

        debug!(tick = self.ticks, kw, cost, monthly, "aggregation tick");
        self.previous = Some(snapshot.clone());
        self.ticks += 1;
        snapshot
    }

    /// Cost of today's retained samples at the configured rate.
    pub fn todays_cost(&self) -> f32 {
        self.todays_cost_on(self.clock.now().date_naive())
    }

    /// The retained sample series.
    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    /// Number of ticks executed so far.
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// The aggregation parameters in effect.
    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Bucketed usage series for one device, anchored at the current time.
    pub fn usage_series(&self, device: &Device, period: UsagePeriod) -> UsageSeries {
        UsageSeries::new(device, period, self.clock.now(), self.settings.idle_weight)
    }

    fn todays_cost_on(&self, day: NaiveDate) -> f32 {
        let todays_sum: f32 = self
            .samples
            .iter()
            .filter(|s| s.timestamp.date_naive() == day)
            .map(|s| s.kw)
            .sum();
        todays_sum * self.settings.rate_per_kwh
    }

    fn reading(&self, value: f32, prior: impl Fn(&AggregateSnapshot) -> f32) -> MetricReading {
        let trend = match &self.previous {
            Some(prev) => classify_trend(prior(prev), value, TREND_EPSILON),
            None => TrendDirection::Neutral,
        };
        MetricReading { value, trend }
    }

    fn prune_other_months(&mut self, today: NaiveDate) {
        let same_month = |d: &NaiveDate| d.year() == today.year() && d.month() == today.month();
        self.daily_kwh.retain(|d, _| same_month(d));
        self.daily_avoided_kwh.retain(|d, _| same_month(d));
    }
}

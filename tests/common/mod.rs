//! Shared test fixtures for integration tests.

use std::sync::Arc;

use homewatt::aggregate::{AggregatorSettings, Passthrough, UsageAggregator};
use homewatt::clock::{Clock, ManualClock};
use homewatt::config::ScenarioConfig;
use homewatt::identity::StaticIdentity;
use homewatt::registry::DeviceRegistry;
use homewatt::store::{InMemoryStore, RetryPolicy};

/// Default test clock, frozen mid-July at noon.
pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::starting_at_ymd_hms(2025, 7, 15, 12, 0, 0))
}

/// Registry seeded with the demo-home scenario devices.
pub fn demo_registry(clock: Arc<ManualClock>) -> DeviceRegistry<InMemoryStore> {
    let mut registry = DeviceRegistry::new(
        InMemoryStore::new(),
        Arc::new(StaticIdentity::signed_in("test-user")),
        clock.clone(),
    )
    .with_retry(RetryPolicy::none());

    for entry in &ScenarioConfig::demo_home().devices {
        registry
            .register(entry.build(clock.now()))
            .expect("demo device should register");
    }
    registry
}

/// Deterministic aggregator (passthrough load model, default settings).
pub fn passthrough_aggregator(clock: Arc<ManualClock>) -> UsageAggregator {
    UsageAggregator::new(AggregatorSettings::default(), Box::new(Passthrough), clock)
}

/// Deterministic aggregator with custom settings.
pub fn passthrough_aggregator_with(
    settings: AggregatorSettings,
    clock: Arc<ManualClock>,
) -> UsageAggregator {
    UsageAggregator::new(settings, Box::new(Passthrough), clock)
}

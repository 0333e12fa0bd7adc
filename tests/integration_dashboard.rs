//! Integration tests for the full registry-to-insights pipeline.

mod common;

use chrono::Duration;

use homewatt::aggregate::{
    AggregatorSettings, SeededJitter, TrendDirection, UsageAggregator, UsagePeriod, active_load_kw,
};
use homewatt::insight::{InsightEngine, Priority};
use homewatt::registry::FAVORITES_CAP;

#[test]
fn full_day_run_produces_one_sample_per_tick() {
    let clock = common::manual_clock();
    let registry = common::demo_registry(clock.clone());
    let mut aggregator = common::passthrough_aggregator(clock.clone());

    for _ in 0..24 {
        let devices = registry.devices();
        aggregator.tick(&devices);
        clock.advance(Duration::seconds(5));
    }

    assert_eq!(aggregator.ticks(), 24);
    assert_eq!(aggregator.samples().len(), 24);
}

#[test]
fn snapshot_values_are_finite_and_consistent() {
    let clock = common::manual_clock();
    let registry = common::demo_registry(clock.clone());
    let mut aggregator = common::passthrough_aggregator(clock.clone());

    let devices = registry.devices();
    let snapshot = aggregator.tick(&devices);

    assert!(snapshot.current_usage.value.is_finite());
    assert!(snapshot.todays_cost.value.is_finite());
    assert!(snapshot.monthly_usage.value.is_finite());
    assert!(snapshot.co2_saved.value.is_finite());

    // Passthrough sampling means the snapshot load equals registry load.
    let expected_kw = active_load_kw(&devices);
    assert!((snapshot.current_usage.value - expected_kw).abs() < 1e-6);
}

#[test]
fn todays_cost_tracks_sampled_load_exactly() {
    let clock = common::manual_clock();
    let registry = common::demo_registry(clock.clone());
    let mut aggregator = common::passthrough_aggregator(clock.clone());

    let devices = registry.devices();
    let kw = active_load_kw(&devices);
    for _ in 0..10 {
        aggregator.tick(&devices);
        clock.advance(Duration::seconds(5));
    }

    let settings = *aggregator.settings();
    let expected = kw * 10.0 * settings.rate_per_kwh;
    assert!((aggregator.todays_cost() - expected).abs() < 1e-4);
}

#[test]
fn toggle_invariant_holds_for_every_demo_device() {
    let clock = common::manual_clock();
    let mut registry = common::demo_registry(clock.clone());

    let ids: Vec<_> = registry.devices().iter().map(|d| d.id.clone()).collect();
    for id in &ids {
        registry.toggle(id).expect("toggle should succeed");
        let device = registry.get(id).expect("device should exist").clone();
        assert!(
            device.is_on || device.current_usage_w == 0.0,
            "off device \"{}\" must not draw power",
            device.name
        );

        registry.toggle(id).expect("toggle back should succeed");
        let device = registry.get(id).expect("device should exist").clone();
        assert!(device.is_on || device.current_usage_w == 0.0);
    }
}

#[test]
fn toggling_devices_changes_the_sampled_load() {
    let clock = common::manual_clock();
    let mut registry = common::demo_registry(clock.clone());
    let mut aggregator = common::passthrough_aggregator(clock.clone());

    let before = aggregator.tick(&registry.devices()).current_usage.value;
    clock.advance(Duration::seconds(5));

    // Switch the air conditioner off and sample again.
    let ac_id = registry
        .devices()
        .iter()
        .find(|d| d.name == "Air Conditioner")
        .map(|d| d.id.clone())
        .expect("demo home has an air conditioner");
    registry.toggle(&ac_id).expect("toggle should succeed");

    let after = aggregator.tick(&registry.devices()).current_usage.value;
    assert!((before - after - 1.8).abs() < 1e-6, "1800 W should vanish");
}

#[test]
fn favorites_view_respects_cap_and_order() {
    let clock = common::manual_clock();
    let registry = common::demo_registry(clock);

    let favorites = registry.favorites();
    assert!(favorites.len() <= FAVORITES_CAP);

    // Demo home pins four devices, in registration order.
    let names: Vec<&str> = favorites.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Living Room Light",
            "Smart TV",
            "Air Conditioner",
            "Refrigerator"
        ]
    );
}

#[test]
fn trend_directions_reflect_load_changes() {
    let clock = common::manual_clock();
    let mut registry = common::demo_registry(clock.clone());
    let mut aggregator = common::passthrough_aggregator(clock.clone());

    let first = aggregator.tick(&registry.devices());
    assert_eq!(first.current_usage.trend, TrendDirection::Neutral);
    clock.advance(Duration::seconds(5));

    // Turning the heater on raises the load.
    let heater_id = registry
        .devices()
        .iter()
        .find(|d| d.name == "Smart Heater")
        .map(|d| d.id.clone())
        .expect("demo home has a heater");
    registry.toggle(&heater_id).expect("toggle should succeed");

    let second = aggregator.tick(&registry.devices());
    assert_eq!(second.current_usage.trend, TrendDirection::Positive);
    clock.advance(Duration::seconds(5));

    registry.toggle(&heater_id).expect("toggle should succeed");
    let third = aggregator.tick(&registry.devices());
    assert_eq!(third.current_usage.trend, TrendDirection::Negative);
}

#[test]
fn determinism_two_identical_seeded_runs_produce_identical_series() {
    let run = || {
        let clock = common::manual_clock();
        let registry = common::demo_registry(clock.clone());
        let mut aggregator = UsageAggregator::new(
            AggregatorSettings::default(),
            Box::new(SeededJitter::new(0.25, 42)),
            clock.clone(),
        );
        let mut series = Vec::new();
        for _ in 0..30 {
            series.push(aggregator.tick(&registry.devices()).current_usage.value);
            clock.advance(Duration::seconds(5));
        }
        series
    };

    assert_eq!(run(), run());
}

#[test]
fn sample_buffer_stays_bounded_over_a_long_run() {
    let clock = common::manual_clock();
    let registry = common::demo_registry(clock.clone());
    let settings = AggregatorSettings {
        sample_cap: 50,
        ..AggregatorSettings::default()
    };
    let mut aggregator = common::passthrough_aggregator_with(settings, clock.clone());

    for _ in 0..200 {
        aggregator.tick(&registry.devices());
        assert!(aggregator.samples().len() <= 50);
        clock.advance(Duration::seconds(5));
    }
    assert_eq!(aggregator.samples().len(), 50);
}

#[test]
fn usage_series_buckets_match_each_period() {
    let clock = common::manual_clock();
    let registry = common::demo_registry(clock.clone());
    let aggregator = common::passthrough_aggregator(clock);

    let devices = registry.devices();
    let tv = devices
        .iter()
        .find(|d| d.name == "Smart TV")
        .expect("demo home has a TV");

    assert_eq!(aggregator.usage_series(tv, UsagePeriod::Day).count(), 24);
    assert_eq!(aggregator.usage_series(tv, UsagePeriod::Week).count(), 7);
    assert_eq!(aggregator.usage_series(tv, UsagePeriod::Month).count(), 31);
    assert_eq!(aggregator.usage_series(tv, UsagePeriod::Year).count(), 12);
}

#[test]
fn usage_series_weights_off_devices_down() {
    let clock = common::manual_clock();
    let mut registry = common::demo_registry(clock.clone());
    let aggregator = common::passthrough_aggregator(clock);

    let tv_id = registry
        .devices()
        .iter()
        .find(|d| d.name == "Smart TV")
        .map(|d| d.id.clone())
        .expect("demo home has a TV");

    let on_total: f32 = {
        let devices = registry.devices();
        let tv = devices.iter().find(|d| d.id == tv_id).expect("tv");
        aggregator
            .usage_series(tv, UsagePeriod::Day)
            .map(|s| s.kw)
            .sum()
    };

    registry.toggle(&tv_id).expect("toggle should succeed");
    let off_total: f32 = {
        let devices = registry.devices();
        let tv = devices.iter().find(|d| d.id == tv_id).expect("tv");
        aggregator
            .usage_series(tv, UsagePeriod::Day)
            .map(|s| s.kw)
            .sum()
    };

    assert!((off_total - on_total * 0.3).abs() < 1e-5);
}

#[test]
fn insight_pipeline_flags_the_long_running_air_conditioner() {
    let clock = common::manual_clock();
    let registry = common::demo_registry(clock.clone());
    let mut aggregator = common::passthrough_aggregator(clock);
    let mut engine = InsightEngine::default();

    let devices = registry.devices();
    let snapshot = aggregator.tick(&devices);
    engine.evaluate(&devices, &snapshot);

    let top = engine.top_insight().expect("demo home should produce insights");
    assert_eq!(top.priority, Priority::High);
    assert!(top.message.contains("Air Conditioner"));
}

#[test]
fn insight_ranking_is_monotone_in_priority() {
    let clock = common::manual_clock();
    let registry = common::demo_registry(clock.clone());
    let mut aggregator = common::passthrough_aggregator(clock);
    let mut engine = InsightEngine::default();

    let devices = registry.devices();
    let snapshot = aggregator.tick(&devices);
    engine.evaluate(&devices, &snapshot);

    let priorities: Vec<Priority> = engine.insights().iter().map(|i| i.priority).collect();
    for pair in priorities.windows(2) {
        assert!(pair[0] >= pair[1], "insights must be ranked high to low");
    }
}

#[test]
fn empty_home_produces_no_insights_and_an_explicit_none() {
    let clock = common::manual_clock();
    let mut aggregator = common::passthrough_aggregator(clock);
    let mut engine = InsightEngine::default();

    let snapshot = aggregator.tick(&[]);
    engine.evaluate(&[], &snapshot);

    assert!(engine.insights().is_empty());
    assert_eq!(engine.top_insight(), None);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn ids(items: &[WorkItem]) -> Vec<(&str, &str)> {
    items.iter().map(|i| (i.scenario_id.as_str(), i.provider_id.as_str())).collect()
}

#[test]
fn cartesian_product_of_scenarios_and_providers() {
    let scenarios = vec!["smoke".to_string(), "regression".to_string()];
    let providers = vec!["openai".to_string(), "claude".to_string()];
    let items = build_work_items("job-a", &scenarios, &providers, ExecutionMode::Direct);
    assert_eq!(items.len(), 4);
    assert_eq!(
        ids(&items),
        vec![
            ("smoke", "openai"),
            ("smoke", "claude"),
            ("regression", "openai"),
            ("regression", "claude"),
        ]
    );
    assert!(items.iter().all(|i| i.max_attempts == 3));
}

#[test]
fn empty_providers_emits_one_default_item_per_scenario() {
    let scenarios = vec!["smoke".to_string()];
    let items = build_work_items("job-a", &scenarios, &[], ExecutionMode::Direct);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].scenario_id, "smoke");
    assert_eq!(items[0].provider_id, "");
}

#[test]
fn empty_scenarios_emits_one_item_per_provider_with_default_scenario() {
    let providers = vec!["openai".to_string(), "claude".to_string()];
    let items = build_work_items("job-a", &[], &providers, ExecutionMode::Direct);
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.scenario_id == "default"));
}

#[test]
fn no_scenarios_and_no_providers_emits_single_default_everything_item() {
    let items = build_work_items("job-a", &[], &[], ExecutionMode::Direct);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].scenario_id, "default");
    assert_eq!(items[0].provider_id, "");
}

#[test]
fn fleet_mode_ignores_providers_and_emits_one_item_per_scenario() {
    let scenarios = vec!["smoke".to_string(), "regression".to_string()];
    let providers = vec!["openai".to_string()];
    let items = build_work_items("job-a", &scenarios, &providers, ExecutionMode::Fleet);
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.provider_id.is_empty()));
}

#[test]
fn fleet_mode_with_no_scenarios_falls_back_to_default() {
    let items = build_work_items("job-a", &[], &[], ExecutionMode::Fleet);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].scenario_id, "default");
}

#[test]
fn item_ids_are_deterministic_and_collision_resistant() {
    let a = WorkItemId::derive("job-a", "smoke", "openai");
    let b = WorkItemId::derive("job-a", "smoke", "openai");
    let c = WorkItemId::derive("job-a", "smoke", "claude");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.0.len(), 16);
}

#[test]
fn scenario_filter_include_then_exclude_with_exclude_winning() {
    let filter = ScenarioFilter {
        include: vec!["smoke-*".to_string()],
        exclude: vec!["smoke-flaky".to_string()],
    };
    let all = vec!["smoke-core".to_string(), "smoke-flaky".to_string(), "regression-a".to_string()];
    let kept = filter.apply(&all).unwrap();
    assert_eq!(kept, vec!["smoke-core"]);
}

#[test]
fn scenario_filter_empty_include_keeps_everything_not_excluded() {
    let filter = ScenarioFilter { include: vec![], exclude: vec!["regression-*".to_string()] };
    let all = vec!["smoke-core".to_string(), "regression-a".to_string()];
    let kept = filter.apply(&all).unwrap();
    assert_eq!(kept, vec!["smoke-core"]);
}

#[test]
fn scenario_filter_rejects_invalid_glob_pattern() {
    let filter = ScenarioFilter { include: vec!["[".to_string()], exclude: vec![] };
    let err = filter.apply(&["smoke-core".to_string()]).unwrap_err();
    assert!(matches!(err, CoreError::InvalidPattern { .. }));
}

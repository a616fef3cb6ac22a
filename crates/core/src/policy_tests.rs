// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn global() -> PrivacyPolicySpec {
    PrivacyPolicySpec {
        level: Some(PolicyLevel::Global),
        recording: RecordingSpec { enabled: true, facade_data: true, rich_data: true },
        pii: PiiSpec { redact: false, encrypt: false, patterns: vec!["ssn".into()] },
        retention: RetentionSpec {
            facade: RetentionTier { warm_days: Some(90), ..Default::default() },
            ..Default::default()
        },
        ..Default::default()
    }
}

fn workspace() -> PrivacyPolicySpec {
    PrivacyPolicySpec {
        level: Some(PolicyLevel::Workspace),
        recording: RecordingSpec { enabled: true, facade_data: true, rich_data: false },
        pii: PiiSpec { redact: false, encrypt: true, patterns: vec!["email".into()] },
        retention: RetentionSpec {
            facade: RetentionTier { warm_days: Some(60), ..Default::default() },
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn readme_example_merge_strictness() {
    let effective = merge_pair(&global(), &workspace());
    assert!(effective.recording.enabled);
    assert!(!effective.recording.rich_data);
    assert!(effective.pii.encrypt);
    assert_eq!(effective.retention.facade.warm_days, Some(60));
}

#[test]
fn enable_flags_and_false_wins() {
    let base = PrivacyPolicySpec { recording: RecordingSpec { enabled: true, ..Default::default() }, ..Default::default() };
    let override_ = PrivacyPolicySpec { recording: RecordingSpec { enabled: false, ..Default::default() }, ..Default::default() };
    assert!(!merge_pair(&base, &override_).recording.enabled);
}

#[test]
fn strictness_flags_or_true_wins() {
    let base = PrivacyPolicySpec::default();
    let override_ = PrivacyPolicySpec { pii: PiiSpec { encrypt: true, ..Default::default() }, ..Default::default() };
    assert!(merge_pair(&base, &override_).pii.encrypt);
}

#[test]
fn pii_patterns_union_dedup_preserves_base_order() {
    let base = PrivacyPolicySpec { pii: PiiSpec { patterns: vec!["ssn".into(), "email".into()], ..Default::default() }, ..Default::default() };
    let override_ = PrivacyPolicySpec { pii: PiiSpec { patterns: vec!["email".into(), "phone".into()], ..Default::default() }, ..Default::default() };
    let merged = merge_pair(&base, &override_);
    assert_eq!(merged.pii.patterns, vec!["ssn".to_string(), "email".to_string(), "phone".to_string()]);
}

#[test]
fn retention_unset_value_absorbs_other_side() {
    let base = PrivacyPolicySpec {
        retention: RetentionSpec { facade: RetentionTier { warm_days: Some(90), ..Default::default() }, ..Default::default() },
        ..Default::default()
    };
    let override_ = PrivacyPolicySpec {
        retention: RetentionSpec { facade: RetentionTier { cold_days: Some(400), ..Default::default() }, ..Default::default() },
        ..Default::default()
    };
    let merged = merge_pair(&base, &override_);
    assert_eq!(merged.retention.facade.warm_days, Some(90));
    assert_eq!(merged.retention.facade.cold_days, Some(400));
}

#[test]
fn retention_both_set_takes_minimum() {
    let base = PrivacyPolicySpec {
        retention: RetentionSpec { facade: RetentionTier { warm_days: Some(90), ..Default::default() }, ..Default::default() },
        ..Default::default()
    };
    let override_ = PrivacyPolicySpec {
        retention: RetentionSpec { facade: RetentionTier { warm_days: Some(30), ..Default::default() }, ..Default::default() },
        ..Default::default()
    };
    assert_eq!(merge_pair(&base, &override_).retention.facade.warm_days, Some(30));
}

#[test]
fn kms_override_wins_when_non_empty() {
    let base = PrivacyPolicySpec { encryption: EncryptionSpec { kms_provider: "base-kms".into(), key_id: "base-key".into(), ..Default::default() }, ..Default::default() };
    let override_ = PrivacyPolicySpec { encryption: EncryptionSpec { kms_provider: "override-kms".into(), ..Default::default() }, ..Default::default() };
    let merged = merge_pair(&base, &override_);
    assert_eq!(merged.encryption.kms_provider, "override-kms");
    assert_eq!(merged.encryption.key_id, "base-key");
}

#[test]
fn merge_chain_folds_left_to_right() {
    let chain = vec![global(), workspace()];
    let merged = merge_chain(&chain).unwrap();
    assert_eq!(merged, merge_pair(&global(), &workspace()));
}

#[test]
fn merge_chain_of_one_returns_it_unchanged() {
    let chain = vec![global()];
    assert_eq!(merge_chain(&chain).unwrap(), global());
}

#[test]
fn merge_chain_empty_is_none() {
    assert!(merge_chain(&[]).is_none());
}

#[test]
fn merge_is_monotone_in_chain_order_not_commutative() {
    let ab = merge_pair(&global(), &workspace());
    let ba = merge_pair(&workspace(), &global());
    // pii.encrypt is OR so order-insensitive here, but retention minimum
    // combined with patterns ordering differs by chain direction.
    assert_eq!(ab.pii.patterns, vec!["ssn".to_string(), "email".to_string()]);
    assert_eq!(ba.pii.patterns, vec!["email".to_string(), "ssn".to_string()]);
}

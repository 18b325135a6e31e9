use crate::cache::{AlertCache, ProbingCache};
use crate::ingress::EventIngress;
use crate::mute;
use crate::silence::{matches_event, SilenceStore};
use crate::status;
use chrono::{Datelike, Utc};
use faultline_common::types::{
    AlertEvent, AlertStatus, EffectiveTime, Labels, ProbingEvent, Silence, SilenceLabel,
    SILENCE_STATUS_ENABLED,
};
use faultline_storage::memory::MemoryStore;
use serde_json::json;
use std::sync::Arc;

fn make_event(tenant: &str, fc: &str, fingerprint: &str) -> AlertEvent {
    AlertEvent {
        tenant_id: tenant.to_string(),
        fault_center_id: fc.to_string(),
        fingerprint: fingerprint.to_string(),
        rule_id: "r-1".to_string(),
        rule_name: "probe rule".to_string(),
        severity: "P1".to_string(),
        recover_notify: true,
        ..Default::default()
    }
}

fn make_silence(tenant: &str, fc: &str, id: &str, labels: Vec<SilenceLabel>) -> Silence {
    let now = Utc::now().timestamp();
    Silence {
        tenant_id: tenant.to_string(),
        fault_center_id: fc.to_string(),
        id: id.to_string(),
        name: format!("silence {id}"),
        labels,
        starts_at: now,
        ends_at: now + 3600,
        status: SILENCE_STATUS_ENABLED,
        ..Default::default()
    }
}

fn ingress_fixture() -> (Arc<AlertCache>, Arc<SilenceStore>, EventIngress) {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(AlertCache::new());
    let silences = Arc::new(SilenceStore::new(store.clone()));
    let ingress = EventIngress::new(cache.clone(), silences.clone(), store);
    (cache, silences, ingress)
}

// ── state machine ──

#[test]
fn transition_table_rejects_unlisted_edges() {
    use AlertStatus::*;
    assert!(status::is_legal(PreAlert, Alerting));
    assert!(status::is_legal(PreAlert, Recovered));
    assert!(status::is_legal(Silenced, Recovered));
    assert!(status::is_legal(Recovered, PreAlert));
    assert!(!status::is_legal(Recovered, Alerting));
    assert!(!status::is_legal(Recovered, Silenced));
    assert!(!status::is_legal(Silenced, Alerting));
}

#[test]
fn transition_into_recovered_forces_send() {
    let mut event = make_event("t1", "fc1", "fp1");
    event.status = AlertStatus::Alerting;
    event.last_send_time = 12345;
    status::transition(&mut event, AlertStatus::Recovered, 999).unwrap();
    assert_eq!(event.status, AlertStatus::Recovered);
    assert_eq!(event.last_send_time, 0);
    assert_eq!(event.recover_time, 999);
}

#[test]
fn illegal_transition_keeps_state() {
    let mut event = make_event("t1", "fc1", "fp1");
    event.status = AlertStatus::Recovered;
    let err = status::transition(&mut event, AlertStatus::Alerting, 0).unwrap_err();
    assert!(err.to_string().contains("recovered"));
    assert_eq!(event.status, AlertStatus::Recovered);
}

#[test]
fn same_state_transition_is_noop() {
    let mut event = make_event("t1", "fc1", "fp1");
    event.status = AlertStatus::Silenced;
    status::transition(&mut event, AlertStatus::Silenced, 0).unwrap();
    assert_eq!(event.status, AlertStatus::Silenced);
}

// ── silence matching ──

#[test]
fn empty_predicate_list_matches_everything() {
    let labels = Labels::new();
    assert!(matches_event(&[], &labels, "any-fp"));
}

#[test]
fn fingerprint_pseudo_label_matches() {
    let predicates = vec![SilenceLabel {
        key: "fingerprint".into(),
        operator: "=".into(),
        value: "abc123".into(),
    }];
    assert!(matches_event(&predicates, &Labels::new(), "abc123"));
    assert!(!matches_event(&predicates, &Labels::new(), "other"));
    // empty fingerprint fails closed
    assert!(!matches_event(&predicates, &Labels::new(), ""));
}

#[test]
fn missing_label_key_fails_closed() {
    let predicates = vec![SilenceLabel {
        key: "instance".into(),
        operator: "=".into(),
        value: ".*".into(),
    }];
    assert!(!matches_event(&predicates, &Labels::new(), "fp"));
}

#[test]
fn non_text_label_value_is_skipped() {
    let mut labels = Labels::new();
    labels.insert("value".into(), json!(0.0));
    labels.insert("instance".into(), json!("web-01"));
    // the numeric label neither matches nor fails; the string one decides
    let predicates = vec![
        SilenceLabel {
            key: "value".into(),
            operator: "=".into(),
            value: "999".into(),
        },
        SilenceLabel {
            key: "instance".into(),
            operator: "=".into(),
            value: "web-.*".into(),
        },
    ];
    assert!(matches_event(&predicates, &labels, "fp"));
}

#[test]
fn negated_predicate_and_unknown_operator() {
    let mut labels = Labels::new();
    labels.insert("instance".into(), json!("db-01"));
    let neq = vec![SilenceLabel {
        key: "instance".into(),
        operator: "!=".into(),
        value: "web-.*".into(),
    }];
    assert!(matches_event(&neq, &labels, "fp"));

    let unsupported = vec![SilenceLabel {
        key: "instance".into(),
        operator: "=~".into(),
        value: "db-.*".into(),
    }];
    assert!(!matches_event(&unsupported, &labels, "fp"));
}

// ── suppression ──

#[test]
fn recover_notify_policy() {
    assert!(mute::recover_notify_suppressed(true, false));
    assert!(!mute::recover_notify_suppressed(true, true));
    assert!(!mute::recover_notify_suppressed(false, false));
}

#[test]
fn empty_week_is_never_out_of_effective_time() {
    let et = EffectiveTime::default();
    assert!(!mute::not_in_effective_time(&et, Utc::now()));
}

// ── fingerprint cache ──

#[tokio::test]
async fn cache_holds_at_most_one_event_per_key() {
    let cache = AlertCache::new();
    let mut event = make_event("t1", "fc1", "fp1");
    event.severity = "P2".into();
    cache.push_event(event.clone()).await.unwrap();
    event.severity = "P0".into();
    cache.push_event(event).await.unwrap();

    let listed = cache.list_events("t1", "fc1").await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].severity, "P0");
}

#[tokio::test]
async fn cache_rejects_empty_fingerprint() {
    let cache = AlertCache::new();
    let event = make_event("t1", "fc1", "");
    assert!(cache.push_event(event).await.is_err());
}

#[tokio::test]
async fn cache_reverse_lookup_by_rule() {
    let cache = AlertCache::new();
    cache.push_event(make_event("t1", "fc1", "fp-a")).await.unwrap();
    cache.push_event(make_event("t1", "fc1", "fp-b")).await.unwrap();

    let fps = cache.fingerprints_by_rule("t1", "fc1", "r-1").await;
    assert_eq!(fps, vec!["fp-a".to_string(), "fp-b".to_string()]);
    assert!(cache.fingerprints_by_rule("t1", "fc1", "r-2").await.is_empty());
}

#[tokio::test]
async fn probing_cache_round_trip() {
    let cache = ProbingCache::new();
    cache
        .set_event(ProbingEvent {
            tenant_id: "t1".into(),
            rule_id: "r-1".into(),
            fingerprint: "fp".into(),
            ..Default::default()
        })
        .await;
    assert!(cache.get_event("t1", "r-1").await.is_some());
    assert!(cache.get_event("t1", "r-2").await.is_none());
}

// ── ingress ──

#[tokio::test]
async fn fresh_event_with_zero_for_duration_escalates() {
    let (cache, _, ingress) = ingress_fixture();
    let event = make_event("t1", "fc1", "fp1");
    ingress.push_event_to_fault_center(event).await.unwrap();

    let stored = cache.get_event("t1", "fc1", "fp1").await.unwrap();
    assert_eq!(stored.status, AlertStatus::Alerting);
    assert!(!stored.is_recovered);
    assert!(stored.first_trigger_time > 0);
}

#[tokio::test]
async fn silence_wins_over_escalation() {
    let (cache, silences, ingress) = ingress_fixture();
    silences
        .push(make_silence(
            "t1",
            "fc1",
            "s-1",
            vec![SilenceLabel {
                key: "fingerprint".into(),
                operator: "=".into(),
                value: "fp1".into(),
            }],
        ))
        .await
        .unwrap();

    let event = make_event("t1", "fc1", "fp1");
    ingress.push_event_to_fault_center(event).await.unwrap();

    let stored = cache.get_event("t1", "fc1", "fp1").await.unwrap();
    assert_eq!(stored.status, AlertStatus::Silenced);
    let info = stored.silence_info.expect("silence info attached");
    assert_eq!(info.silence_id, "s-1");
    assert!(info.remaining_time > 0);
}

#[tokio::test]
async fn recovery_wins_over_silence() {
    let (cache, silences, ingress) = ingress_fixture();
    silences
        .push(make_silence("t1", "fc1", "s-1", vec![]))
        .await
        .unwrap();

    // first push lands in Silenced (blanket silence)
    ingress
        .push_event_to_fault_center(make_event("t1", "fc1", "fp1"))
        .await
        .unwrap();
    assert_eq!(
        cache.get_event("t1", "fc1", "fp1").await.unwrap().status,
        AlertStatus::Silenced
    );

    // recovery overrides the still-active silence
    let mut recovery = make_event("t1", "fc1", "fp1");
    recovery.is_recovered = true;
    ingress.push_event_to_fault_center(recovery).await.unwrap();

    let stored = cache.get_event("t1", "fc1", "fp1").await.unwrap();
    assert_eq!(stored.status, AlertStatus::Recovered);
    assert_eq!(stored.last_send_time, 0);
    assert!(stored.recover_time > 0);
}

#[tokio::test]
async fn out_of_effective_time_blocks_escalation() {
    let (cache, _, ingress) = ingress_fixture();
    let mut event = make_event("t1", "fc1", "fp1");
    // a window on some other weekday than today
    let other_day = (Utc::now().weekday().num_days_from_sunday() + 1) % 7;
    event.effective_time = EffectiveTime {
        week: vec![other_day],
        start_time: 0,
        end_time: 86399,
    };
    ingress.push_event_to_fault_center(event).await.unwrap();

    let stored = cache.get_event("t1", "fc1", "fp1").await.unwrap();
    assert_eq!(stored.status, AlertStatus::PreAlert);
}

#[tokio::test]
async fn recovery_bridges_to_legacy_fingerprint() {
    let (cache, _, ingress) = ingress_fixture();

    // an episode tracked under an old address-based fingerprint
    ingress
        .push_event_to_fault_center(make_event("t1", "fc1", "old-addr-fp"))
        .await
        .unwrap();

    // the recovery arrives under the new rule-based fingerprint
    let mut recovery = make_event("t1", "fc1", "new-rule-fp");
    recovery.is_recovered = true;
    ingress.push_event_to_fault_center(recovery).await.unwrap();

    let stored = cache.get_event("t1", "fc1", "old-addr-fp").await.unwrap();
    assert_eq!(stored.status, AlertStatus::Recovered);
    // the new fingerprint never materialized as a second slot
    assert_eq!(cache.list_events("t1", "fc1").await.len(), 1);
}

#[tokio::test]
async fn confirm_state_survives_merges() {
    let (cache, _, ingress) = ingress_fixture();
    ingress
        .push_event_to_fault_center(make_event("t1", "fc1", "fp1"))
        .await
        .unwrap();

    let mut claimed = cache.get_event("t1", "fc1", "fp1").await.unwrap();
    claimed.confirm_state.is_ok = true;
    claimed.confirm_state.confirm_username = "alice".into();
    cache.push_event(claimed).await.unwrap();

    ingress
        .push_event_to_fault_center(make_event("t1", "fc1", "fp1"))
        .await
        .unwrap();
    let stored = cache.get_event("t1", "fc1", "fp1").await.unwrap();
    assert!(stored.confirm_state.is_ok);
    assert_eq!(stored.confirm_state.confirm_username, "alice");
}

#[tokio::test]
async fn ingress_refuses_anonymous_events() {
    let (_, _, ingress) = ingress_fixture();
    let mut no_tenant = make_event("", "fc1", "fp1");
    no_tenant.tenant_id = String::new();
    assert!(ingress.push_event_to_fault_center(no_tenant).await.is_err());

    let no_fp = make_event("t1", "fc1", "");
    assert!(ingress.push_event_to_fault_center(no_fp).await.is_err());
}

#[tokio::test]
async fn recovered_episode_is_copied_to_history() {
    let store = MemoryStore::new();
    let mut event = make_event("t1", "fc1", "fp1");
    event.first_trigger_time = 100;
    event.recover_time = 460;
    event.is_recovered = true;
    crate::history::record_alert_his_event(&store, &event)
        .await
        .unwrap();
    assert_eq!(store.event_history_count().await, 1);
}

#[tokio::test]
async fn silence_lift_returns_event_to_pre_alert() {
    let (cache, silences, ingress) = ingress_fixture();
    let mut silence = make_silence(
        "t1",
        "fc1",
        "s-1",
        vec![SilenceLabel {
            key: "fingerprint".into(),
            operator: "=".into(),
            value: "fp1".into(),
        }],
    );
    ingress
        .push_event_to_fault_center(make_event("t1", "fc1", "fp1"))
        .await
        .unwrap();

    silences.push(silence.clone()).await.unwrap();
    ingress
        .push_event_to_fault_center(make_event("t1", "fc1", "fp1"))
        .await
        .unwrap();
    assert_eq!(
        cache.get_event("t1", "fc1", "fp1").await.unwrap().status,
        AlertStatus::Silenced
    );

    // expire the silence in the cache; next merge lifts the suppression
    silence.ends_at = Utc::now().timestamp() - 1;
    silences.push(silence).await.unwrap();
    ingress
        .push_event_to_fault_center(make_event("t1", "fc1", "fp1"))
        .await
        .unwrap();
    let stored = cache.get_event("t1", "fc1", "fp1").await.unwrap();
    assert_eq!(stored.status, AlertStatus::PreAlert);
    assert!(stored.silence_info.is_none());
}

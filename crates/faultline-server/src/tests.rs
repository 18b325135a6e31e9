use crate::duty::{
    analyze_schedule_pattern, generate_duty_schedule, DutyCalendarService, DutyCreateRequest,
    FORMAL_STATUS,
};
use crate::quick_action::{QuickActionError, QuickActionService};
use chrono::{Datelike, Utc};
use faultline_alert::cache::{AlertCache, ProbingCache};
use faultline_alert::silence::SilenceStore;
use faultline_common::types::{
    AlertEvent, AlertStatus, DutySchedule, DutyUser, FaultCenter, ProbingEndpointConfig,
    ProbingEvent, ProbingRule, RuleType,
};
use faultline_notify::confirmation::ConfirmationNotifier;
use faultline_notify::resolver::WebhookResolver;
use faultline_storage::memory::MemoryStore;
use faultline_storage::DutyRepo;
use std::sync::Arc;

struct Fixture {
    store: Arc<MemoryStore>,
    cache: Arc<AlertCache>,
    probing_cache: Arc<ProbingCache>,
    service: QuickActionService,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(AlertCache::new());
    let probing_cache = Arc::new(ProbingCache::new());
    let silences = Arc::new(SilenceStore::new(store.clone()));
    let resolver = WebhookResolver::new(store.clone(), store.clone(), store.clone());
    let notifier = Arc::new(ConfirmationNotifier::new(resolver));
    let service = QuickActionService::new(
        cache.clone(),
        probing_cache.clone(),
        silences,
        store.clone(),
        store.clone(),
        store.clone(),
        notifier,
    );
    Fixture {
        store,
        cache,
        probing_cache,
        service,
    }
}

async fn seed_fault_center_alert(fixture: &Fixture, fingerprint: &str) {
    fixture
        .store
        .insert_fault_center(FaultCenter {
            tenant_id: "T".to_string(),
            id: "FC1".to_string(),
            name: "核心服务".to_string(),
            ..Default::default()
        })
        .await;
    fixture
        .cache
        .push_event(AlertEvent {
            tenant_id: "T".to_string(),
            fault_center_id: "FC1".to_string(),
            fingerprint: fingerprint.to_string(),
            rule_id: "r-1".to_string(),
            rule_name: "接口探测".to_string(),
            severity: "P1".to_string(),
            status: AlertStatus::Alerting,
            recover_notify: true,
            ..Default::default()
        })
        .await
        .unwrap();
}

// ── claim (S4) ──

#[tokio::test]
async fn claim_blocks_reclaim() {
    let fx = fixture();
    seed_fault_center_alert(&fx, "fp1").await;

    fx.service
        .claim_alert("T", "fp1", "alice", "10.1.1.1")
        .await
        .unwrap();
    let event = fx.cache.get_event("T", "FC1", "fp1").await.unwrap();
    assert!(event.confirm_state.is_ok);
    assert_eq!(event.confirm_state.confirm_username, "alice");

    let err = fx
        .service
        .claim_alert("T", "fp1", "bob", "10.1.1.2")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "告警已被 alice 认领");
    // state unchanged by the refused claim
    let event = fx.cache.get_event("T", "FC1", "fp1").await.unwrap();
    assert_eq!(event.confirm_state.confirm_username, "alice");
}

#[tokio::test]
async fn claim_requires_a_fault_center() {
    let fx = fixture();
    fx.store
        .insert_probing_rule(probing_rule("r-9", true))
        .await;
    fx.probing_cache
        .set_event(ProbingEvent {
            tenant_id: "T".to_string(),
            rule_id: "r-9".to_string(),
            rule_name: "裸拨测".to_string(),
            fingerprint: "fp-probe".to_string(),
            ..Default::default()
        })
        .await;

    let err = fx
        .service
        .claim_alert("T", "fp-probe", "alice", "ip")
        .await
        .unwrap_err();
    assert!(matches!(err, QuickActionError::NotInFaultCenter));
}

// ── silence (S3) ──

#[tokio::test]
async fn silence_is_idempotent_with_remaining_time() {
    let fx = fixture();
    seed_fault_center_alert(&fx, "fp1").await;
    let before = Utc::now().timestamp();

    fx.service
        .silence_alert("T", "fp1", "1h", "alice", None, "ip")
        .await
        .unwrap();

    let event = fx.cache.get_event("T", "FC1", "fp1").await.unwrap();
    assert_eq!(event.status, AlertStatus::Silenced);
    let info = event.silence_info.expect("silence info attached");
    assert!((info.ends_at - before - 3600).abs() <= 5);
    assert!(info.comment.contains("alice"));

    let err = fx
        .service
        .silence_alert("T", "fp1", "1h", "bob", None, "ip")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("1小时"), "got: {err}");
    // cache state unchanged by the refused silence
    let event = fx.cache.get_event("T", "FC1", "fp1").await.unwrap();
    assert_eq!(event.silence_info.unwrap().silence_id, info.silence_id);
}

#[tokio::test]
async fn silence_rejects_bad_duration() {
    let fx = fixture();
    seed_fault_center_alert(&fx, "fp1").await;
    let err = fx
        .service
        .silence_alert("T", "fp1", "1x", "alice", None, "ip")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("无效的静默时长"));
}

#[tokio::test]
async fn silence_with_reason_lands_in_comment() {
    let fx = fixture();
    seed_fault_center_alert(&fx, "fp1").await;
    fx.service
        .silence_alert("T", "fp1", "6h", "alice", Some("变更窗口"), "ip")
        .await
        .unwrap();
    let event = fx.cache.get_event("T", "FC1", "fp1").await.unwrap();
    assert!(event.silence_info.unwrap().comment.contains("原因: 变更窗口"));
}

// ── resolve ──

#[tokio::test]
async fn resolve_marks_recovered_once() {
    let fx = fixture();
    seed_fault_center_alert(&fx, "fp1").await;

    fx.service
        .resolve_alert("T", "fp1", "alice", "ip")
        .await
        .unwrap();
    let event = fx.cache.get_event("T", "FC1", "fp1").await.unwrap();
    assert!(event.is_recovered);
    assert_eq!(event.status, AlertStatus::Recovered);
    assert_eq!(event.last_send_time, 0);
    assert!(event.recover_time > 0);

    let err = fx
        .service
        .resolve_alert("T", "fp1", "bob", "ip")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "告警已经恢复");
}

fn probing_rule(rule_id: &str, enabled: bool) -> ProbingRule {
    ProbingRule {
        tenant_id: "T".to_string(),
        rule_id: rule_id.to_string(),
        rule_name: "裸拨测".to_string(),
        rule_type: RuleType::Tcp,
        probing_endpoint_config: ProbingEndpointConfig::default(),
        fault_center_id: String::new(),
        notice_id: String::new(),
        severity: "P2".to_string(),
        annotations: String::new(),
        repeat_notice_interval: 0,
        recover_notify: true,
        enabled,
    }
}

#[tokio::test]
async fn resolve_updates_probing_cache_for_rule_local_alerts() {
    let fx = fixture();
    fx.store.insert_probing_rule(probing_rule("r-9", true)).await;
    fx.probing_cache
        .set_event(ProbingEvent {
            tenant_id: "T".to_string(),
            rule_id: "r-9".to_string(),
            rule_name: "裸拨测".to_string(),
            fingerprint: "fp-probe".to_string(),
            last_send_time: 42,
            ..Default::default()
        })
        .await;

    fx.service
        .resolve_alert("T", "fp-probe", "alice", "ip")
        .await
        .unwrap();
    let event = fx.probing_cache.get_event("T", "r-9").await.unwrap();
    assert!(event.is_recovered);
    assert_eq!(event.last_send_time, 0);
    assert!(event.recover_time > 0);
}

#[tokio::test]
async fn lookup_searches_fault_centers_then_probing_rules() {
    let fx = fixture();
    seed_fault_center_alert(&fx, "fp1").await;
    fx.store.insert_probing_rule(probing_rule("r-9", true)).await;
    fx.probing_cache
        .set_event(ProbingEvent {
            tenant_id: "T".to_string(),
            rule_id: "r-9".to_string(),
            rule_name: "裸拨测".to_string(),
            fingerprint: "fp-probe".to_string(),
            ..Default::default()
        })
        .await;

    let from_fc = fx.service.get_alert_by_fingerprint("T", "fp1").await.unwrap();
    assert_eq!(from_fc.rule_name, "接口探测");

    let from_probing = fx
        .service
        .get_alert_by_fingerprint("T", "fp-probe")
        .await
        .unwrap();
    assert_eq!(from_probing.rule_name, "裸拨测");
    assert!(from_probing.fault_center_id.is_empty());

    let err = fx
        .service
        .get_alert_by_fingerprint("T", "fp-missing")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("未找到指纹"));
}

#[tokio::test]
async fn quick_actions_leave_an_audit_trail() {
    let fx = fixture();
    seed_fault_center_alert(&fx, "fp1").await;
    fx.service
        .claim_alert("T", "fp1", "alice", "10.1.1.1")
        .await
        .unwrap();

    // the audit write is fire-and-forget; give it a moment
    for _ in 0..50 {
        if fx.store.audit_log_count().await >= 1 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("audit log was never written");
}

// ── duty roster (C11) ──

fn group(name: &str) -> Vec<DutyUser> {
    vec![DutyUser {
        user_id: name.to_string(),
        username: name.to_string(),
    }]
}

#[test]
fn day_roster_round_robins_groups() {
    let request = DutyCreateRequest {
        tenant_id: "T".to_string(),
        duty_id: "d-1".to_string(),
        month: "2025-01".to_string(),
        date_type: "day".to_string(),
        duty_period: 1,
        user_groups: vec![group("a"), group("b")],
        status: FORMAL_STATUS.to_string(),
    };
    let schedules = generate_duty_schedule(&request).unwrap();
    // 2025 is not a leap year: a full year from Jan 1 is 365 rows
    assert_eq!(schedules.len(), 365);
    assert_eq!(schedules[0].date, "2025-1-1");
    assert_eq!(schedules[0].users, group("a"));
    assert_eq!(schedules[1].users, group("b"));
    assert_eq!(schedules[2].users, group("a"));
    assert_eq!(schedules.last().unwrap().date, "2025-12-31");
}

#[test]
fn week_roster_aligns_handover_to_sunday() {
    let request = DutyCreateRequest {
        tenant_id: "T".to_string(),
        duty_id: "d-1".to_string(),
        month: "2025-01".to_string(),
        date_type: "week".to_string(),
        duty_period: 1,
        user_groups: vec![group("a"), group("b")],
        status: FORMAL_STATUS.to_string(),
    };
    let schedules = generate_duty_schedule(&request).unwrap();
    let by_date = |date: &str| {
        schedules
            .iter()
            .find(|s| s.date == date)
            .unwrap_or_else(|| panic!("no row for {date}"))
            .users
            .clone()
    };
    // 2025-01-01 is a Wednesday: group a holds a short leading slot up to
    // Sunday the 5th, then whole weeks alternate
    assert_eq!(by_date("2025-1-1"), group("a"));
    assert_eq!(by_date("2025-1-5"), group("a"));
    assert_eq!(by_date("2025-1-6"), group("b"));
    assert_eq!(by_date("2025-1-12"), group("b"));
    assert_eq!(by_date("2025-1-13"), group("a"));
    assert_eq!(by_date("2025-1-19"), group("a"));
}

#[test]
fn degenerate_roster_requests_are_refused() {
    let mut request = DutyCreateRequest {
        tenant_id: "T".to_string(),
        duty_id: "d-1".to_string(),
        month: "2025-01".to_string(),
        date_type: "day".to_string(),
        duty_period: 0,
        user_groups: vec![group("a")],
        status: FORMAL_STATUS.to_string(),
    };
    assert!(generate_duty_schedule(&request).is_err());
    request.duty_period = 1;
    request.user_groups.clear();
    assert!(generate_duty_schedule(&request).is_err());
    request.user_groups = vec![group("a")];
    request.date_type = "fortnight".to_string();
    assert!(generate_duty_schedule(&request).is_err());
}

#[test]
fn pattern_inference_detects_day_and_week_periods() {
    let rows = |runs: &[(&str, usize)]| {
        let mut day = 1;
        let mut out = Vec::new();
        for (name, len) in runs {
            for _ in 0..*len {
                out.push(DutySchedule {
                    tenant_id: "T".to_string(),
                    duty_id: "d-1".to_string(),
                    date: format!("2025-12-{day}"),
                    users: group(name),
                    status: FORMAL_STATUS.to_string(),
                });
                day += 1;
            }
        }
        out
    };

    // 7-day runs: weekly rotation, period 1
    let (groups, date_type, period) =
        analyze_schedule_pattern(&rows(&[("a", 7), ("b", 7)])).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(date_type, "week");
    assert_eq!(period, 1);

    // 2-day runs: daily rotation, period 2
    let (_, date_type, period) =
        analyze_schedule_pattern(&rows(&[("a", 2), ("b", 2), ("a", 2), ("b", 2)])).unwrap();
    assert_eq!(date_type, "day");
    assert_eq!(period, 2);

    // too few rows to infer: the week/1 default applies
    let (_, date_type, period) = analyze_schedule_pattern(&rows(&[("a", 3)])).unwrap();
    assert_eq!(date_type, "week");
    assert_eq!(period, 1);

    assert!(analyze_schedule_pattern(&[]).is_none());
}

#[tokio::test]
async fn auto_extend_generates_next_year_once() {
    let store = Arc::new(MemoryStore::new());
    let service = DutyCalendarService::new(store.clone());

    // seed this December with a weekly rotation
    let year = Utc::now().year();
    for day in 1..=14 {
        store
            .upsert(DutySchedule {
                tenant_id: "T".to_string(),
                duty_id: "d-1".to_string(),
                date: format!("{year}-12-{day}"),
                users: group(if day <= 7 { "a" } else { "b" }),
                status: FORMAL_STATUS.to_string(),
            })
            .await
            .unwrap();
    }

    service.auto_generate_next_year().await.unwrap();
    let next_first = DutyRepo::get(store.as_ref(), "d-1", &format!("{}-1-1", year + 1))
        .await
        .unwrap();
    assert!(next_first.is_some(), "next January was generated");

    // a second pass sees the existing rows and leaves them alone
    let users_before = next_first.unwrap().users;
    service.auto_generate_next_year().await.unwrap();
    let again = DutyRepo::get(store.as_ref(), "d-1", &format!("{}-1-1", year + 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.users, users_before);
}

use crate::supervisor::{ProbingSupervisor, RECOVERY_THRESHOLD};
use faultline_alert::cache::{AlertCache, ProbingCache};
use faultline_alert::ingress::EventIngress;
use faultline_alert::silence::SilenceStore;
use faultline_common::types::{
    md5_hash, AlertStatus, HttpProbeConfig, IcmpProbeConfig, Labels, ProbingEndpointConfig,
    ProbingRule, ProbingStrategy, RuleType,
};
use faultline_storage::memory::MemoryStore;
use serde_json::json;
use std::sync::Arc;

fn fixture() -> Arc<ProbingSupervisor> {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(AlertCache::new());
    let silences = Arc::new(SilenceStore::new(store.clone()));
    let ingress = Arc::new(EventIngress::new(cache, silences, store.clone()));
    ProbingSupervisor::new(ingress, Arc::new(ProbingCache::new()), store.clone(), store)
}

fn tcp_rule(fault_center_id: &str) -> ProbingRule {
    ProbingRule {
        tenant_id: "T".to_string(),
        rule_id: "R1".to_string(),
        rule_name: "tcp probe".to_string(),
        rule_type: RuleType::Tcp,
        probing_endpoint_config: ProbingEndpointConfig {
            endpoint: "10.0.0.1:9".to_string(),
            strategy: ProbingStrategy {
                eval_interval: 1,
                timeout: 1,
                field: String::new(),
                operator: String::new(),
                expected_value: 0.0,
                failure: 3,
            },
            icmp: IcmpProbeConfig::default(),
            http: HttpProbeConfig::default(),
        },
        fault_center_id: fault_center_id.to_string(),
        notice_id: "n-1".to_string(),
        severity: "P1".to_string(),
        annotations: "endpoint ${address} unreachable".to_string(),
        repeat_notice_interval: 0,
        recover_notify: true,
        enabled: true,
    }
}

fn tcp_snapshot(successful: bool) -> Labels {
    let mut labels = Labels::new();
    labels.insert("address".into(), json!("10.0.0.1:9"));
    labels.insert("IsSuccessful".into(), json!(successful));
    labels.insert("Latency".into(), json!(3.0));
    labels
}

#[tokio::test]
async fn tcp_failures_below_threshold_stay_silent() {
    let supervisor = fixture();
    let rule = tcp_rule("FC1");
    let fingerprint = md5_hash(b"R1");

    for _ in 0..2 {
        supervisor
            .process_measurement(&rule, tcp_snapshot(false))
            .await
            .unwrap();
    }

    assert!(supervisor
        .ingress()
        .cache()
        .get_event("T", "FC1", &fingerprint)
        .await
        .is_none());
}

#[tokio::test]
async fn third_tcp_failure_fires_alert() {
    let supervisor = fixture();
    let rule = tcp_rule("FC1");
    let fingerprint = md5_hash(b"R1");

    for _ in 0..3 {
        supervisor
            .process_measurement(&rule, tcp_snapshot(false))
            .await
            .unwrap();
    }

    let event = supervisor
        .ingress()
        .cache()
        .get_event("T", "FC1", &fingerprint)
        .await
        .expect("threshold reached, event cached");
    assert_eq!(event.status, AlertStatus::Alerting);
    assert!(!event.is_recovered);
    assert_eq!(event.labels["value"], json!(0.0));
    assert_eq!(event.annotations, "endpoint 10.0.0.1:9 unreachable");
    // counters were reset after firing
    assert_eq!(
        supervisor.get_frequency(crate::supervisor::Counter::Fail, "R1"),
        0
    );
}

#[tokio::test]
async fn recovery_needs_three_consecutive_successes() {
    let supervisor = fixture();
    let rule = tcp_rule("FC1");
    let fingerprint = md5_hash(b"R1");

    for _ in 0..3 {
        supervisor
            .process_measurement(&rule, tcp_snapshot(false))
            .await
            .unwrap();
    }

    // two successes: still alerting
    for _ in 0..(RECOVERY_THRESHOLD - 1) {
        supervisor
            .process_measurement(&rule, tcp_snapshot(true))
            .await
            .unwrap();
        let event = supervisor
            .ingress()
            .cache()
            .get_event("T", "FC1", &fingerprint)
            .await
            .unwrap();
        assert_eq!(event.status, AlertStatus::Alerting);
    }

    // third success recovers
    supervisor
        .process_measurement(&rule, tcp_snapshot(true))
        .await
        .unwrap();
    let event = supervisor
        .ingress()
        .cache()
        .get_event("T", "FC1", &fingerprint)
        .await
        .unwrap();
    assert_eq!(event.status, AlertStatus::Recovered);
    assert!(event.is_recovered);
    assert_eq!(event.last_send_time, 0);
    assert!(event.recover_time > 0);
    assert_eq!(event.labels["value"], json!(1.0));
}

#[tokio::test]
async fn successes_without_prior_alert_push_nothing() {
    let supervisor = fixture();
    let rule = tcp_rule("FC1");
    let fingerprint = md5_hash(b"R1");

    for _ in 0..5 {
        supervisor
            .process_measurement(&rule, tcp_snapshot(true))
            .await
            .unwrap();
    }

    assert!(supervisor
        .ingress()
        .cache()
        .get_event("T", "FC1", &fingerprint)
        .await
        .is_none());
    assert_eq!(
        supervisor.get_frequency(crate::supervisor::Counter::Ok, "R1"),
        0
    );
}

#[tokio::test]
async fn field_threshold_rules_read_the_strategy_field() {
    let supervisor = fixture();
    let mut rule = tcp_rule("FC1");
    rule.rule_type = RuleType::Icmp;
    rule.probing_endpoint_config.strategy.field = "PacketLoss".to_string();
    rule.probing_endpoint_config.strategy.operator = ">".to_string();
    rule.probing_endpoint_config.strategy.expected_value = 90.0;
    rule.probing_endpoint_config.strategy.failure = 1;

    let mut snapshot = Labels::new();
    snapshot.insert("address".into(), json!("10.0.0.1"));
    snapshot.insert("PacketLoss".into(), json!(100.0));
    supervisor.process_measurement(&rule, snapshot).await.unwrap();

    let event = supervisor
        .ingress()
        .cache()
        .get_event("T", "FC1", &md5_hash(b"R1"))
        .await
        .expect("single failure with threshold 1 fires");
    assert_eq!(event.labels["value"], json!(100.0));
    assert_eq!(event.datasource_type, "icmp");
}

#[tokio::test]
async fn rules_without_fault_center_use_the_local_cache() {
    let supervisor = fixture();
    let rule = tcp_rule("");
    let fingerprint = md5_hash(b"R1");

    for _ in 0..3 {
        supervisor
            .process_measurement(&rule, tcp_snapshot(false))
            .await
            .unwrap();
    }

    let event = supervisor
        .probing_cache()
        .get_event("T", "R1")
        .await
        .expect("local cache holds the episode");
    assert_eq!(event.fingerprint, fingerprint);
    assert!(!event.is_recovered);

    for _ in 0..RECOVERY_THRESHOLD {
        supervisor
            .process_measurement(&rule, tcp_snapshot(true))
            .await
            .unwrap();
    }
    let event = supervisor.probing_cache().get_event("T", "R1").await.unwrap();
    assert!(event.is_recovered);
    assert_eq!(event.last_send_time, 0);
    assert!(event.recover_time > 0);
}

#[tokio::test]
async fn last_measurement_snapshot_is_kept() {
    let supervisor = fixture();
    let rule = tcp_rule("FC1");
    supervisor
        .process_measurement(&rule, tcp_snapshot(true))
        .await
        .unwrap();
    let value = supervisor
        .probing_cache()
        .get_value("T", "R1")
        .await
        .expect("value map updated on every tick");
    assert_eq!(value["IsSuccessful"], json!(true));
}

#[tokio::test]
async fn supervisor_add_and_stop_lifecycle() {
    let supervisor = fixture();
    let mut rule = tcp_rule("FC1");
    rule.probing_endpoint_config.endpoint = "127.0.0.1:9".to_string();
    supervisor.add(rule.clone());
    assert_eq!(supervisor.active_worker_count(), 1);

    supervisor.stop("R1");
    assert_eq!(supervisor.active_worker_count(), 0);

    supervisor.add(rule);
    supervisor.stop_all();
    assert_eq!(supervisor.active_worker_count(), 0);
}

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label values are heterogeneous: probe snapshots mix strings, numbers and
/// booleans under one map, so the value side stays dynamic.
pub type Labels = HashMap<String, serde_json::Value>;

/// md5 hex digest, used for probing fingerprints (`md5(rule_id)`) so the
/// alert identity survives endpoint address changes.
pub fn md5_hash(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Canonical life-cycle states of an alert event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    #[default]
    PreAlert,
    Alerting,
    Silenced,
    PendingRecovery,
    Recovered,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::PreAlert => write!(f, "pre_alert"),
            AlertStatus::Alerting => write!(f, "alerting"),
            AlertStatus::Silenced => write!(f, "silenced"),
            AlertStatus::PendingRecovery => write!(f, "pending_recovery"),
            AlertStatus::Recovered => write!(f, "recovered"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_alert" => Ok(AlertStatus::PreAlert),
            "alerting" => Ok(AlertStatus::Alerting),
            "silenced" => Ok(AlertStatus::Silenced),
            "pending_recovery" => Ok(AlertStatus::PendingRecovery),
            "recovered" => Ok(AlertStatus::Recovered),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}

/// Claim state of an alert. `is_ok == true` implies a non-empty username.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmState {
    pub is_ok: bool,
    pub confirm_username: String,
    pub confirm_action_time: i64,
}

/// Silence metadata attached to an event while a silence rule matches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceInfo {
    pub silence_id: String,
    pub starts_at: i64,
    pub ends_at: i64,
    pub remaining_time: i64,
    pub comment: String,
}

/// Recurring weekly window during which a rule's alerts may escalate.
/// Weekdays use 0=Sunday..6=Saturday; seconds count from midnight UTC.
/// An empty weekday set means the rule is always in effective time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectiveTime {
    pub week: Vec<u32>,
    pub start_time: i64,
    pub end_time: i64,
}

impl EffectiveTime {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        if self.week.is_empty() {
            return true;
        }
        let weekday = now.weekday().num_days_from_sunday();
        if !self.week.contains(&weekday) {
            return false;
        }
        let seconds = i64::from(now.time().num_seconds_from_midnight());
        seconds >= self.start_time && seconds <= self.end_time
    }
}

/// The central record: one alert instance, keyed by
/// `(tenant_id, fault_center_id, fingerprint)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertEvent {
    pub tenant_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub datasource_type: String,
    pub datasource_id: String,
    pub fingerprint: String,
    pub severity: String,
    pub labels: Labels,
    pub annotations: String,
    pub event_id: String,
    pub fault_center_id: String,

    pub eval_interval: i64,
    pub for_duration: i64,
    pub repeat_notice_interval: i64,
    pub effective_time: EffectiveTime,
    pub recover_notify: bool,

    pub first_trigger_time: i64,
    pub last_eval_time: i64,
    pub last_send_time: i64,
    pub recover_time: i64,

    pub status: AlertStatus,
    pub is_recovered: bool,
    pub confirm_state: ConfirmState,
    pub silence_info: Option<SilenceInfo>,
    pub duty_user: String,

    /// Denormalized snapshot of the owning fault center, refreshed on every
    /// ingress merge so downstream consumers need no extra lookup.
    pub fault_center: Option<FaultCenter>,
}

impl AlertEvent {
    /// Whether the pre-alert hold time has elapsed since the first trigger.
    pub fn is_arrive_for_duration(&self, now: i64) -> bool {
        now - self.first_trigger_time >= self.for_duration
    }
}

/// A single label predicate of a silence rule. `value` is a regex; the
/// special key `fingerprint` matches the event fingerprint instead of a label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceLabel {
    pub key: String,
    pub operator: String,
    pub value: String,
}

pub const SILENCE_STATUS_ENABLED: i32 = 1;

/// A user-scoped suppression rule, scoped to a tenant and fault center.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Silence {
    pub tenant_id: String,
    pub id: String,
    pub name: String,
    pub labels: Vec<SilenceLabel>,
    pub comment: String,
    pub starts_at: i64,
    pub ends_at: i64,
    pub update_at: i64,
    pub update_by: String,
    pub fault_center_id: String,
    /// 1 = enabled, 0 = disabled (wire-compatible with the upstream store).
    pub status: i32,
}

impl Silence {
    pub fn is_enabled(&self) -> bool {
        self.status == SILENCE_STATUS_ENABLED
    }

    /// Active means enabled and not yet past its end time.
    pub fn is_active(&self, now: i64) -> bool {
        self.is_enabled() && now < self.ends_at
    }
}

/// Kind of synthetic probe a rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Icmp,
    Http,
    Tcp,
    Tls,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleType::Icmp => write!(f, "icmp"),
            RuleType::Http => write!(f, "http"),
            RuleType::Tcp => write!(f, "tcp"),
            RuleType::Tls => write!(f, "tls"),
        }
    }
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "icmp" => Ok(RuleType::Icmp),
            "http" => Ok(RuleType::Http),
            "tcp" => Ok(RuleType::Tcp),
            "tls" | "ssl" => Ok(RuleType::Tls),
            _ => Err(format!("unknown rule type: {s}")),
        }
    }
}

/// Threshold strategy of a probing rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbingStrategy {
    /// Seconds between evaluations.
    pub eval_interval: i64,
    /// Per-probe timeout budget in seconds.
    pub timeout: i64,
    /// Which measurement field the condition reads (e.g. `PacketLoss`).
    pub field: String,
    pub operator: String,
    pub expected_value: f64,
    /// Consecutive failures required before an alert fires.
    pub failure: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IcmpProbeConfig {
    /// Seconds between echo requests.
    pub interval: i64,
    pub count: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpProbeConfig {
    pub method: String,
    pub header: HashMap<String, String>,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbingEndpointConfig {
    pub endpoint: String,
    pub strategy: ProbingStrategy,
    #[serde(default)]
    pub icmp: IcmpProbeConfig,
    #[serde(default)]
    pub http: HttpProbeConfig,
}

/// A synthetic-monitoring rule. One enabled rule owns one probing worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbingRule {
    pub tenant_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub rule_type: RuleType,
    pub probing_endpoint_config: ProbingEndpointConfig,
    /// When set, events route through the fault-center ingress; otherwise
    /// the worker keeps its own per-rule event cache.
    pub fault_center_id: String,
    /// Fallback notification target for rules outside a fault center.
    pub notice_id: String,
    pub severity: String,
    pub annotations: String,
    pub repeat_notice_interval: i64,
    pub recover_notify: bool,
    pub enabled: bool,
}

/// Cached state of a probing rule that is not attached to a fault center.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbingEvent {
    pub tenant_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub fingerprint: String,
    pub severity: String,
    pub labels: Labels,
    pub annotations: String,
    pub is_recovered: bool,
    pub first_trigger_time: i64,
    pub last_eval_time: i64,
    pub last_send_time: i64,
    pub recover_time: i64,
    pub repeat_notice_interval: i64,
    pub duty_user: String,
}

/// Raw probe snapshot persisted to the history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbingHistory {
    pub timestamp: i64,
    pub rule_id: String,
    pub value: Labels,
}

/// One comparison applied to a probe measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCondition {
    pub operator: String,
    pub query_value: f64,
    pub expected_value: f64,
}

impl EvalCondition {
    /// True when the measured value breaches the expectation.
    pub fn is_triggered(&self) -> bool {
        match self.operator.as_str() {
            ">" => self.query_value > self.expected_value,
            ">=" => self.query_value >= self.expected_value,
            "<" => self.query_value < self.expected_value,
            "<=" => self.query_value <= self.expected_value,
            "==" | "=" => (self.query_value - self.expected_value).abs() < f64::EPSILON,
            "!=" => (self.query_value - self.expected_value).abs() >= f64::EPSILON,
            _ => false,
        }
    }
}

/// One webhook route of a notice, keyed by severity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoticeRoute {
    pub severity: String,
    pub hook: String,
    pub sign: String,
}

/// A notification target (chat webhook plus optional duty roster binding).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Notice {
    pub tenant_id: String,
    pub id: String,
    pub name: String,
    /// `FeiShu`, `DingDing`, `Email`, `WeChat`, `Slack`, `CustomHook`.
    pub notice_type: String,
    pub default_hook: String,
    pub default_sign: String,
    pub routes: Vec<NoticeRoute>,
    pub duty_id: Option<String>,
}

/// A tenant-scoped bucket grouping rules and notification channels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaultCenter {
    pub tenant_id: String,
    pub id: String,
    pub name: String,
    pub notice_ids: Vec<String>,
    pub repeat_notice_interval: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DutyUser {
    pub user_id: String,
    pub username: String,
}

/// One day of a duty roster: which user group is on call on `date`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DutySchedule {
    pub tenant_id: String,
    pub duty_id: String,
    /// Formatted `YYYY-M-D`, matching the upstream roster view.
    pub date: String,
    pub users: Vec<DutyUser>,
    pub status: String,
}

/// Finalized copy of an alert episode, written once on recovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertHisEvent {
    pub tenant_id: String,
    pub event_id: String,
    pub datasource_type: String,
    pub datasource_id: String,
    pub fingerprint: String,
    pub rule_id: String,
    pub rule_name: String,
    pub severity: String,
    pub labels: Labels,
    pub eval_interval: i64,
    pub annotations: String,
    pub first_trigger_time: i64,
    pub last_eval_time: i64,
    pub last_send_time: i64,
    pub recover_time: i64,
    pub fault_center_id: String,
    pub confirm_state: ConfirmState,
    pub alarm_duration: i64,
}

/// Audit trail entry written for every quick action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    pub tenant_id: String,
    pub username: String,
    pub ip_address: String,
    pub audit_type: String,
    pub method: String,
    pub path: String,
    pub created_at: i64,
    pub status_code: i32,
    pub body: String,
}

/// Quick-action feature configuration. Cards only embed action buttons when
/// the feature is enabled and both the base URL and signing key are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuickActionConfig {
    pub enabled: bool,
    /// Frontend address, used by detail-page buttons.
    pub base_url: String,
    /// Backend API address, used by quick-action buttons; falls back to
    /// `base_url` when empty.
    pub api_url: String,
    pub secret_key: String,
}

impl QuickActionConfig {
    pub fn buttons_available(&self) -> bool {
        self.enabled && !self.base_url.is_empty() && !self.secret_key.is_empty()
    }

    pub fn api_or_base_url(&self) -> &str {
        if self.api_url.is_empty() {
            &self.base_url
        } else {
            &self.api_url
        }
    }
}

/// A login-capable member, consulted by the quick-login flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    pub username: String,
    /// bcrypt hash.
    pub password: String,
}

/// Render labels as `k=v` pairs sorted by key, for card bodies and logs.
pub fn format_labels(labels: &Labels) -> String {
    let mut pairs: Vec<_> = labels.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => format!("{k}={s}"),
            other => format!("{k}={other}"),
        })
        .collect::<Vec<_>>()
        .join(",")
}

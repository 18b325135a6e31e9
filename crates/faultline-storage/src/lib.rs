//! Repository seams over the persistent metadata store.
//!
//! The alert core never talks to a database directly; it goes through these
//! traits. The bundled [`memory::MemoryStore`] backs the server wiring and
//! the test suites; a SQL-backed implementation plugs in behind the same
//! traits.

pub mod auth;
pub mod memory;


use anyhow::Result;
use async_trait::async_trait;
use faultline_common::types::{
    AlertHisEvent, AuditLog, DutySchedule, DutyUser, FaultCenter, Member, Notice, ProbingHistory,
    ProbingRule, Silence,
};

/// Fault-center records (tenant-scoped buckets of rules and channels).
#[async_trait]
pub trait FaultCenterRepo: Send + Sync {
    async fn list(&self, tenant_id: &str) -> Result<Vec<FaultCenter>>;
    async fn get(&self, tenant_id: &str, id: &str) -> Result<Option<FaultCenter>>;
}

/// Notification targets referenced by fault centers and probing rules.
#[async_trait]
pub trait NoticeRepo: Send + Sync {
    async fn get(&self, tenant_id: &str, id: &str) -> Result<Option<Notice>>;
}

/// Persisted silence rules. The cache-side mirror lives in the alert crate;
/// this is the durable half of the write-through pair.
#[async_trait]
pub trait SilenceRepo: Send + Sync {
    async fn create(&self, silence: Silence) -> Result<()>;
    /// All enabled silences of a tenant, for fingerprint-dedup scans.
    async fn list_enabled(&self, tenant_id: &str) -> Result<Vec<Silence>>;
}

/// Probing rules as configured by operators.
#[async_trait]
pub trait ProbingRuleRepo: Send + Sync {
    /// Enabled rules, optionally restricted to one tenant.
    async fn list_enabled(&self, tenant_id: Option<&str>) -> Result<Vec<ProbingRule>>;
    async fn get(&self, tenant_id: &str, rule_id: &str) -> Result<Option<ProbingRule>>;
}

/// Raw probe snapshots (append-only history).
#[async_trait]
pub trait ProbingHistoryRepo: Send + Sync {
    async fn add_record(&self, record: ProbingHistory) -> Result<()>;
}

/// Audit trail of quick actions.
#[async_trait]
pub trait AuditLogRepo: Send + Sync {
    async fn create(&self, log: AuditLog) -> Result<()>;
}

/// Finalized alert episodes.
#[async_trait]
pub trait EventHistoryRepo: Send + Sync {
    async fn create(&self, event: AlertHisEvent) -> Result<()>;
}

/// Login members for the quick-action flow.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_by_username(&self, username: &str) -> Result<Option<Member>>;
}

/// Duty roster rows, keyed by `(tenant, duty, date)`.
#[async_trait]
pub trait DutyRepo: Send + Sync {
    async fn get(&self, duty_id: &str, date: &str) -> Result<Option<DutySchedule>>;
    /// Insert or overwrite the row for the schedule's `(duty, date)` key.
    async fn upsert(&self, schedule: DutySchedule) -> Result<()>;
    /// Rows of one duty whose date starts with `month_prefix` (`"2025-12"`),
    /// ordered by date.
    async fn search_month(
        &self,
        tenant_id: &str,
        duty_id: &str,
        month_prefix: &str,
    ) -> Result<Vec<DutySchedule>>;
    /// Every known `(tenant_id, duty_id)` pair.
    async fn list_duties(&self) -> Result<Vec<(String, String)>>;
    /// The user group on call for `duty_id` on `date`, if any.
    async fn get_duty_users(&self, duty_id: &str, date: &str) -> Result<Option<Vec<DutyUser>>>;
}

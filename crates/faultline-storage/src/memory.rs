use crate::{
    AuditLogRepo, DutyRepo, EventHistoryRepo, FaultCenterRepo, NoticeRepo, ProbingHistoryRepo,
    ProbingRuleRepo, SilenceRepo, UserRepo,
};
use anyhow::Result;
use async_trait::async_trait;
use faultline_common::types::{
    AlertHisEvent, AuditLog, DutySchedule, DutyUser, FaultCenter, Member, Notice, ProbingHistory,
    ProbingRule, Silence,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of every repository trait.
///
/// Backs the default server wiring and the test suites. All maps live under
/// independent `RwLock`s; there is no cross-repo transaction, matching the
/// guarantees of the real store.
#[derive(Default)]
pub struct MemoryStore {
    fault_centers: RwLock<HashMap<(String, String), FaultCenter>>,
    notices: RwLock<HashMap<(String, String), Notice>>,
    silences: RwLock<HashMap<(String, String), Silence>>,
    probing_rules: RwLock<HashMap<(String, String), ProbingRule>>,
    probing_history: RwLock<Vec<ProbingHistory>>,
    audit_logs: RwLock<Vec<AuditLog>>,
    event_history: RwLock<Vec<AlertHisEvent>>,
    users: RwLock<HashMap<String, Member>>,
    duty_schedules: RwLock<HashMap<(String, String), DutySchedule>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_fault_center(&self, fc: FaultCenter) {
        self.fault_centers
            .write()
            .await
            .insert((fc.tenant_id.clone(), fc.id.clone()), fc);
    }

    pub async fn insert_notice(&self, notice: Notice) {
        self.notices
            .write()
            .await
            .insert((notice.tenant_id.clone(), notice.id.clone()), notice);
    }

    pub async fn insert_probing_rule(&self, rule: ProbingRule) {
        self.probing_rules
            .write()
            .await
            .insert((rule.tenant_id.clone(), rule.rule_id.clone()), rule);
    }

    pub async fn insert_user(&self, member: Member) {
        self.users
            .write()
            .await
            .insert(member.username.clone(), member);
    }

    pub async fn audit_log_count(&self) -> usize {
        self.audit_logs.read().await.len()
    }

    pub async fn probing_history_count(&self) -> usize {
        self.probing_history.read().await.len()
    }

    pub async fn event_history_count(&self) -> usize {
        self.event_history.read().await.len()
    }
}

#[async_trait]
impl FaultCenterRepo for MemoryStore {
    async fn list(&self, tenant_id: &str) -> Result<Vec<FaultCenter>> {
        let mut out: Vec<_> = self
            .fault_centers
            .read()
            .await
            .values()
            .filter(|fc| fc.tenant_id == tenant_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn get(&self, tenant_id: &str, id: &str) -> Result<Option<FaultCenter>> {
        Ok(self
            .fault_centers
            .read()
            .await
            .get(&(tenant_id.to_string(), id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl NoticeRepo for MemoryStore {
    async fn get(&self, tenant_id: &str, id: &str) -> Result<Option<Notice>> {
        Ok(self
            .notices
            .read()
            .await
            .get(&(tenant_id.to_string(), id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl SilenceRepo for MemoryStore {
    async fn create(&self, silence: Silence) -> Result<()> {
        self.silences
            .write()
            .await
            .insert((silence.tenant_id.clone(), silence.id.clone()), silence);
        Ok(())
    }

    async fn list_enabled(&self, tenant_id: &str) -> Result<Vec<Silence>> {
        Ok(self
            .silences
            .read()
            .await
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.is_enabled())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProbingRuleRepo for MemoryStore {
    async fn list_enabled(&self, tenant_id: Option<&str>) -> Result<Vec<ProbingRule>> {
        let mut out: Vec<_> = self
            .probing_rules
            .read()
            .await
            .values()
            .filter(|r| r.enabled && tenant_id.map_or(true, |t| r.tenant_id == t))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
        Ok(out)
    }

    async fn get(&self, tenant_id: &str, rule_id: &str) -> Result<Option<ProbingRule>> {
        Ok(self
            .probing_rules
            .read()
            .await
            .get(&(tenant_id.to_string(), rule_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl ProbingHistoryRepo for MemoryStore {
    async fn add_record(&self, record: ProbingHistory) -> Result<()> {
        self.probing_history.write().await.push(record);
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepo for MemoryStore {
    async fn create(&self, log: AuditLog) -> Result<()> {
        self.audit_logs.write().await.push(log);
        Ok(())
    }
}

#[async_trait]
impl EventHistoryRepo for MemoryStore {
    async fn create(&self, event: AlertHisEvent) -> Result<()> {
        self.event_history.write().await.push(event);
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn get_by_username(&self, username: &str) -> Result<Option<Member>> {
        Ok(self.users.read().await.get(username).cloned())
    }
}

#[async_trait]
impl DutyRepo for MemoryStore {
    async fn get(&self, duty_id: &str, date: &str) -> Result<Option<DutySchedule>> {
        Ok(self
            .duty_schedules
            .read()
            .await
            .get(&(duty_id.to_string(), date.to_string()))
            .cloned())
    }

    async fn upsert(&self, schedule: DutySchedule) -> Result<()> {
        self.duty_schedules
            .write()
            .await
            .insert((schedule.duty_id.clone(), schedule.date.clone()), schedule);
        Ok(())
    }

    async fn search_month(
        &self,
        tenant_id: &str,
        duty_id: &str,
        month_prefix: &str,
    ) -> Result<Vec<DutySchedule>> {
        let mut rows: Vec<_> = self
            .duty_schedules
            .read()
            .await
            .values()
            .filter(|s| {
                s.tenant_id == tenant_id
                    && s.duty_id == duty_id
                    && s.date.starts_with(month_prefix)
            })
            .cloned()
            .collect();
        // dates are "YYYY-M-D"; sort numerically, not lexically
        rows.sort_by_key(|s| date_sort_key(&s.date));
        Ok(rows)
    }

    async fn list_duties(&self) -> Result<Vec<(String, String)>> {
        let mut out: Vec<_> = self
            .duty_schedules
            .read()
            .await
            .values()
            .map(|s| (s.tenant_id.clone(), s.duty_id.clone()))
            .collect();
        out.sort();
        out.dedup();
        Ok(out)
    }

    async fn get_duty_users(&self, duty_id: &str, date: &str) -> Result<Option<Vec<DutyUser>>> {
        Ok(self
            .duty_schedules
            .read()
            .await
            .get(&(duty_id.to_string(), date.to_string()))
            .map(|s| s.users.clone()))
    }
}

fn date_sort_key(date: &str) -> (i32, u32, u32) {
    let mut parts = date.splitn(3, '-');
    let y = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let m = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let d = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (y, m, d)
}

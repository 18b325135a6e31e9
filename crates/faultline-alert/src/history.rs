//! Finalized-event history.

use anyhow::Result;
use faultline_common::types::{AlertEvent, AlertHisEvent};
use faultline_storage::EventHistoryRepo;

/// Copy a closed episode into the history repo. Only transitions and
/// finalized events are persisted, never per-cycle evaluations.
pub async fn record_alert_his_event(repo: &dyn EventHistoryRepo, alert: &AlertEvent) -> Result<()> {
    let record = AlertHisEvent {
        tenant_id: alert.tenant_id.clone(),
        event_id: alert.event_id.clone(),
        datasource_type: alert.datasource_type.clone(),
        datasource_id: alert.datasource_id.clone(),
        fingerprint: alert.fingerprint.clone(),
        rule_id: alert.rule_id.clone(),
        rule_name: alert.rule_name.clone(),
        severity: alert.severity.clone(),
        labels: alert.labels.clone(),
        eval_interval: alert.eval_interval,
        annotations: alert.annotations.clone(),
        first_trigger_time: alert.first_trigger_time,
        last_eval_time: alert.last_eval_time,
        last_send_time: alert.last_send_time,
        recover_time: alert.recover_time,
        fault_center_id: alert.fault_center_id.clone(),
        confirm_state: alert.confirm_state.clone(),
        alarm_duration: alert.recover_time - alert.first_trigger_time,
    };
    repo.create(record).await
}

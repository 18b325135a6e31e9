//! The per-rule probing loop.

use crate::supervisor::ProbingSupervisor;
use crate::{prober_for, EndpointOption};
use chrono::Utc;
use faultline_common::types::{ProbingHistory, ProbingRule};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Probe at t=0 and then every `eval_interval` seconds until cancelled.
/// Cancellation is edge-triggered at the next tick; an in-flight probe
/// finishes within its own timeout budget.
pub(crate) async fn run(
    supervisor: Arc<ProbingSupervisor>,
    rule: ProbingRule,
    cancel: CancellationToken,
) {
    let interval = rule
        .probing_endpoint_config
        .strategy
        .eval_interval
        .max(1) as u64;
    let mut ticker = tokio::time::interval(Duration::from_secs(interval));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(rule_id = %rule.rule_id, "拨测任务已停止");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = tick(&supervisor, &rule).await {
                    tracing::error!(rule_id = %rule.rule_id, error = %e, "拨测评估失败");
                }
            }
        }
    }
}

async fn tick(supervisor: &ProbingSupervisor, rule: &ProbingRule) -> anyhow::Result<()> {
    let prober = prober_for(rule.rule_type);
    let value = prober.pilot(&EndpointOption::from_rule(rule)).await?;

    // history is best-effort; a write failure never skips the evaluation
    if let Err(e) = supervisor
        .history()
        .add_record(ProbingHistory {
            timestamp: Utc::now().timestamp(),
            rule_id: rule.rule_id.clone(),
            value: value.clone(),
        })
        .await
    {
        tracing::error!(rule_id = %rule.rule_id, error = %e, "拨测历史写入失败");
    }

    supervisor.process_measurement(rule, value).await
}

//! Suppression evaluator.
//!
//! Three independent reasons hold an event down: an active matching silence,
//! being outside the rule's effective-time window, and the per-rule policy
//! of not notifying on recovery.

use crate::silence::{matches_event, SilenceStore};
use chrono::{DateTime, Utc};
use faultline_common::types::{EffectiveTime, Labels, Silence};

pub struct MuteParams<'a> {
    pub tenant_id: &'a str,
    pub fault_center_id: &'a str,
    pub fingerprint: &'a str,
    pub labels: &'a Labels,
    pub effective_time: &'a EffectiveTime,
    pub is_recovered: bool,
    pub recover_notify: bool,
}

/// Any suppression reason applies.
pub async fn is_muted(store: &SilenceStore, params: &MuteParams<'_>, now: DateTime<Utc>) -> bool {
    if get_matched_silence(store, params, now.timestamp())
        .await
        .is_some()
    {
        return true;
    }
    if not_in_effective_time(params.effective_time, now) {
        return true;
    }
    recover_notify_suppressed(params.is_recovered, params.recover_notify)
}

/// Outside the weekly escalation window. Rules with an empty weekday set
/// are always in effective time.
pub fn not_in_effective_time(effective_time: &EffectiveTime, now: DateTime<Utc>) -> bool {
    !effective_time.contains(now)
}

/// Recovery events are muted when the rule opted out of recovery notices.
pub fn recover_notify_suppressed(is_recovered: bool, recover_notify: bool) -> bool {
    is_recovered && !recover_notify
}

/// First active silence in the event's bucket whose predicates all match,
/// so the caller can attach its metadata to the event.
pub async fn get_matched_silence(
    store: &SilenceStore,
    params: &MuteParams<'_>,
    now: i64,
) -> Option<Silence> {
    let ids = store
        .list_ids(params.tenant_id, params.fault_center_id)
        .await;
    for id in ids {
        let Some(silence) = store
            .get_by_id(params.tenant_id, params.fault_center_id, &id)
            .await
        else {
            continue;
        };
        if !silence.is_active(now) {
            continue;
        }
        if matches_event(&silence.labels, params.labels, params.fingerprint) {
            return Some(silence);
        }
    }
    None
}

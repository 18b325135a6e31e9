//! Alert life-cycle state machine.
//!
//! The legality table is closed: any edge not listed here is rejected and
//! the event keeps its current state. Callers log the rejection with full
//! context; nothing is written to the cache on an illegal edge.

use crate::AlertError;
use faultline_common::types::{AlertEvent, AlertStatus};

/// Whether `from -> to` is a permitted life-cycle edge.
///
/// Silence wins over pre-alert escalation; recovery wins over silence.
/// `PendingRecovery` is entered by the notification consumer once a
/// recovery candidate is observed, and either confirms (`Recovered`) or
/// falls back to `Alerting` when the condition re-triggers.
pub fn is_legal(from: AlertStatus, to: AlertStatus) -> bool {
    use AlertStatus::*;
    matches!(
        (from, to),
        (PreAlert, Recovered)
            | (PreAlert, Silenced)
            | (PreAlert, Alerting)
            | (Alerting, Recovered)
            | (Alerting, Silenced)
            | (Alerting, PendingRecovery)
            | (PendingRecovery, Recovered)
            | (PendingRecovery, Alerting)
            | (Silenced, Recovered)
            | (Silenced, PreAlert)
            | (Recovered, PreAlert)
    )
}

/// Apply a transition to `event`, enforcing the legality table.
///
/// A same-state "transition" is a no-op and always succeeds. The edge into
/// `Recovered` zeroes `last_send_time` (so the recovery notification always
/// goes out) and stamps `recover_time`.
pub fn transition(event: &mut AlertEvent, to: AlertStatus, now: i64) -> Result<(), AlertError> {
    let from = event.status;
    if from == to {
        return Ok(());
    }
    if !is_legal(from, to) {
        return Err(AlertError::IllegalTransition { from, to });
    }

    if to == AlertStatus::Recovered {
        event.last_send_time = 0;
        event.recover_time = now;
    }
    event.status = to;
    Ok(())
}

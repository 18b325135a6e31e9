//! On-duty user rendering for chat messages.

use chrono::{Datelike, Utc};
use faultline_common::types::Notice;
use faultline_storage::DutyRepo;

/// Today's date in the roster view's `YYYY-M-D` form.
pub fn today_key() -> String {
    let now = Utc::now();
    format!("{}-{}-{}", now.year(), now.month(), now.day())
}

/// Render today's on-duty users as channel-appropriate at-mentions.
/// Falls back to `暂无` when the notice has no roster or no row for today.
pub async fn get_duty_users(repo: &dyn DutyRepo, notice: &Notice) -> Vec<String> {
    let Some(duty_id) = notice.duty_id.as_deref() else {
        return vec!["暂无".to_string()];
    };
    let users = match repo.get_duty_users(duty_id, &today_key()).await {
        Ok(Some(users)) if !users.is_empty() => users,
        _ => return vec!["暂无".to_string()],
    };

    match notice.notice_type.as_str() {
        "FeiShu" => users
            .iter()
            .map(|u| format!("<at id={}></at>", u.user_id))
            .collect(),
        "DingDing" => users.iter().map(|u| format!("@{}", u.user_id)).collect(),
        "Slack" => users.iter().map(|u| format!("<@{}>", u.user_id)).collect(),
        "Email" | "WeChat" | "CustomHook" => {
            users.iter().map(|u| format!("@{}", u.username)).collect()
        }
        _ => vec!["暂无".to_string()],
    }
}

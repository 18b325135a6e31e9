//! Duty roster generation.
//!
//! A roster request expands deterministically into one row per day for the
//! next 12 months, round-robining through the user groups. Week-based
//! periods hand over at end of week (Sunday), so the first group may hold a
//! short leading slot. On December 1 the auto-extend pass infers each
//! roster's pattern from its December rows and generates the next year.

use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use faultline_common::types::{DutySchedule, DutyUser};
use faultline_storage::DutyRepo;
use std::sync::Arc;

/// Status marking generated rows as the official roster.
pub const FORMAL_STATUS: &str = "formal";

#[derive(Debug, Clone)]
pub struct DutyCreateRequest {
    pub tenant_id: String,
    pub duty_id: String,
    /// First month of the expansion, `YYYY-MM`.
    pub month: String,
    /// `"day"` or `"week"`.
    pub date_type: String,
    pub duty_period: i64,
    pub user_groups: Vec<Vec<DutyUser>>,
    pub status: String,
}

pub struct DutyCalendarService {
    repo: Arc<dyn DutyRepo>,
}

impl DutyCalendarService {
    pub fn new(repo: Arc<dyn DutyRepo>) -> Self {
        Self { repo }
    }

    /// Expand the request and upsert every generated day.
    pub async fn create_and_update(&self, request: &DutyCreateRequest) -> Result<usize> {
        let schedules = generate_duty_schedule(request)?;
        let count = schedules.len();
        for schedule in schedules {
            self.repo.upsert(schedule).await?;
        }
        Ok(count)
    }

    /// December-1 pass: for every roster without next-year rows, infer its
    /// pattern from this December and generate next January onwards.
    pub async fn auto_generate_next_year(&self) -> Result<()> {
        tracing::info!("开始自动生成次年值班表");
        let duties = self.repo.list_duties().await?;
        let current_year = Utc::now().year();
        let next_year = current_year + 1;

        let mut success = 0usize;
        let mut failed = 0usize;
        let mut skipped = 0usize;
        for (tenant_id, duty_id) in duties {
            match self
                .generate_next_year_for_duty(&tenant_id, &duty_id, current_year, next_year)
                .await
            {
                Ok(true) => success += 1,
                Ok(false) => skipped += 1,
                Err(e) => {
                    tracing::error!(duty_id, error = %e, "生成次年值班表失败");
                    failed += 1;
                }
            }
        }
        tracing::info!(success, failed, skipped, "自动生成次年值班表完成");
        Ok(())
    }

    async fn generate_next_year_for_duty(
        &self,
        tenant_id: &str,
        duty_id: &str,
        current_year: i32,
        next_year: i32,
    ) -> Result<bool> {
        // next year's first day already present means a human beat us to it
        let first_day = format!("{next_year}-1-1");
        if self.repo.get(duty_id, &first_day).await?.is_some() {
            return Ok(false);
        }

        let december = self
            .repo
            .search_month(tenant_id, duty_id, &format!("{current_year}-12"))
            .await?;
        if december.is_empty() {
            anyhow::bail!("未找到当前年度的值班记录，无法自动生成");
        }

        let Some((user_groups, date_type, duty_period)) = analyze_schedule_pattern(&december)
        else {
            tracing::warn!(duty_id, "无法分析出有效的值班规则，跳过");
            return Ok(false);
        };

        let request = DutyCreateRequest {
            tenant_id: tenant_id.to_string(),
            duty_id: duty_id.to_string(),
            month: format!("{next_year}-01"),
            date_type,
            duty_period,
            user_groups,
            status: FORMAL_STATUS.to_string(),
        };
        let count = self.create_and_update(&request).await?;
        tracing::info!(duty_id, count, "次年值班表已生成");
        Ok(true)
    }
}

/// Infer `(user_groups, date_type, period)` from existing rows.
///
/// Groups are deduplicated in first-appearance order; the length of the
/// leading run of identical groups decides day-vs-week and the period.
/// Returns `None` when no groups exist or the period would be degenerate.
pub fn analyze_schedule_pattern(
    schedules: &[DutySchedule],
) -> Option<(Vec<Vec<DutyUser>>, String, i64)> {
    if schedules.is_empty() {
        return None;
    }

    let group_key = |users: &[DutyUser]| serde_json::to_string(users).unwrap_or_default();

    let mut seen = Vec::new();
    let mut user_groups: Vec<Vec<DutyUser>> = Vec::new();
    for schedule in schedules {
        let key = group_key(&schedule.users);
        if !seen.contains(&key) {
            seen.push(key);
            user_groups.push(schedule.users.clone());
        }
    }
    if user_groups.is_empty() {
        return None;
    }

    let mut date_type = "week".to_string();
    let mut duty_period = 1i64;

    if schedules.len() >= 7 {
        let first_key = group_key(&schedules[0].users);
        let mut consecutive = 1i64;
        for schedule in schedules.iter().skip(1).take(29) {
            if group_key(&schedule.users) == first_key {
                consecutive += 1;
            } else {
                break;
            }
        }
        if consecutive >= 7 {
            date_type = "week".to_string();
            duty_period = consecutive / 7;
        } else {
            date_type = "day".to_string();
            duty_period = consecutive;
        }
    }

    if duty_period < 1 {
        return None;
    }
    Some((user_groups, date_type, duty_period))
}

/// Deterministic expansion: one row per day from the first of `month` for a
/// full year.
pub fn generate_duty_schedule(request: &DutyCreateRequest) -> Result<Vec<DutySchedule>> {
    if request.user_groups.is_empty() {
        anyhow::bail!("值班用户组为空");
    }
    if request.duty_period < 1 {
        anyhow::bail!("值班周期必须大于 0");
    }
    let duty_days = match request.date_type.as_str() {
        "day" => request.duty_period,
        "week" => 7 * request.duty_period,
        other => anyhow::bail!("不支持的值班类型: {other}"),
    };

    let (year, month) = parse_month(&request.month)?;
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow::anyhow!("无效的月份: {}", request.month))?;
    let end = start
        .checked_add_months(chrono::Months::new(12))
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .ok_or_else(|| anyhow::anyhow!("无效的月份: {}", request.month))?;

    let mut dates = start.iter_days().take_while(|d| *d <= end);
    let mut schedules = Vec::new();

    'outer: loop {
        for users in &request.user_groups {
            let mut weeks_served = 0i64;
            for _ in 0..duty_days {
                let Some(date) = dates.next() else {
                    break 'outer;
                };
                schedules.push(DutySchedule {
                    tenant_id: request.tenant_id.clone(),
                    duty_id: request.duty_id.clone(),
                    date: format_date(date),
                    users: users.clone(),
                    status: request.status.clone(),
                });
                // week periods hand over at end of week, which keeps every
                // later slot aligned to whole weeks
                if request.date_type == "week" && date.weekday() == Weekday::Sun {
                    weeks_served += 1;
                    if weeks_served == request.duty_period {
                        break;
                    }
                }
            }
        }
    }

    Ok(schedules)
}

fn parse_month(month: &str) -> Result<(i32, u32)> {
    let (year, month) = month
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("无效的月份: {month}"))?;
    Ok((year.parse()?, month.parse()?))
}

/// Unpadded `YYYY-M-D`, the roster view's native key format.
fn format_date(date: NaiveDate) -> String {
    format!("{}-{}-{}", date.year(), date.month(), date.day())
}

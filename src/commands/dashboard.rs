use chrono::{Datelike, Months, NaiveDate};

use crate::error::{DeskError, DeskResult};
use crate::models::Analytics;
use crate::render::analytics::{render_analytics, AnalyticsView};
use crate::services::api::Action;
use crate::services::state::AppState;
use crate::utils::{format_date, normalize_date, today};

/// The last twelve months including the current one.
pub fn default_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let from = today
        .with_day(1)
        .and_then(|d| d.checked_sub_months(Months::new(11)))
        .unwrap_or(today);
    (from, today)
}

fn parse_bound(raw: Option<&str>, fallback: NaiveDate) -> DeskResult<NaiveDate> {
    match raw {
        None => Ok(fallback),
        Some(raw) => normalize_date(raw).ok_or_else(|| DeskError::InvalidDate(raw.to_string())),
    }
}

pub async fn load_analytics(
    state: &AppState,
    date_from: Option<&str>,
    date_to: Option<&str>,
) -> DeskResult<AnalyticsView> {
    let role = state.role()?;
    let (default_from, default_to) = default_range(today());
    let from = parse_bound(date_from, default_from)?;
    let to = parse_bound(date_to, default_to)?;
    if from > to {
        return Err(DeskError::InvalidDateRange {
            from: format_date(from),
            to: format_date(to),
        });
    }

    let analytics: Analytics = state
        .backend
        .call(&Action::GetAnalytics {
            date_from: from,
            date_to: to,
        })
        .await
        .into_data()?;
    Ok(render_analytics(role, from, to, &analytics))
}

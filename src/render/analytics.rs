use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::models::{Analytics, MonthlyAnalytics, Role};
use crate::render::{money, with_cost_columns, Column, Visibility};
use crate::utils::{format_date, month_key};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub delivery_count: u32,
    pub total_sell: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
    pub paid_total: f64,
    pub unpaid_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthRow {
    pub month: String,
    pub delivery_count: u32,
    pub total_sell: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsView {
    pub role: Role,
    pub date_from: String,
    pub date_to: String,
    pub columns: Vec<Column>,
    pub summary: AnalyticsSummary,
    pub months: Vec<MonthRow>,
}

/// Months from `from` to `to` inclusive, as `YYYY-MM`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> Vec<String> {
    let mut months = Vec::new();
    let Some(mut cursor) = from.with_day(1) else {
        return months;
    };
    while cursor <= to {
        months.push(month_key(cursor));
        match cursor.checked_add_months(Months::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    months
}

/// Summary plus a month-by-month breakdown covering the whole range; months
/// the backend did not report appear as zero rows.
pub fn render_analytics(
    role: Role,
    date_from: NaiveDate,
    date_to: NaiveDate,
    analytics: &Analytics,
) -> AnalyticsView {
    let visibility = Visibility::for_role(role);

    let mut by_month: BTreeMap<String, MonthlyAnalytics> = BTreeMap::new();
    for month in months_between(date_from, date_to) {
        by_month.insert(
            month.clone(),
            MonthlyAnalytics {
                month,
                delivery_count: 0,
                total_cost: 0.0,
                total_sell: 0.0,
            },
        );
    }
    for reported in &analytics.monthly {
        let slot = by_month
            .entry(reported.month.clone())
            .or_insert_with(|| MonthlyAnalytics {
                month: reported.month.clone(),
                delivery_count: 0,
                total_cost: 0.0,
                total_sell: 0.0,
            });
        slot.delivery_count += reported.delivery_count;
        slot.total_cost += reported.total_cost;
        slot.total_sell += reported.total_sell;
    }

    let months = by_month
        .into_values()
        .map(|m| MonthRow {
            month: m.month,
            delivery_count: m.delivery_count,
            total_sell: money(m.total_sell),
            total_cost: visibility.cost(m.total_cost),
            margin: visibility.margin(m.total_sell - m.total_cost),
        })
        .collect();

    AnalyticsView {
        role,
        date_from: format_date(date_from),
        date_to: format_date(date_to),
        columns: with_cost_columns(vec![Column::Date, Column::Items, Column::Sell], &visibility, Column::Cost),
        summary: AnalyticsSummary {
            delivery_count: analytics.delivery_count,
            total_sell: money(analytics.total_sell),
            total_cost: visibility.cost(analytics.total_cost),
            margin: visibility.margin(analytics.total_sell - analytics.total_cost),
            paid_total: money(analytics.paid_total),
            unpaid_total: money(analytics.unpaid_total),
        },
        months,
    }
}

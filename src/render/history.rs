use serde::Serialize;

use crate::models::{AuditLogEntry, PriceHistoryEntry, Role};
use crate::render::{money, Visibility};
use crate::utils::format_date;

pub const NO_HISTORY: &str = "no price changes";
pub const NO_AUDIT_ENTRIES: &str = "no activity";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistoryRow {
    pub date: Option<String>,
    pub old_cost: f64,
    pub new_cost: f64,
    pub change: f64,
    pub changed_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistoryView {
    pub product_id: i64,
    pub rows: Vec<PriceHistoryRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRow {
    pub date: Option<String>,
    pub user: String,
    pub action: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogView {
    pub rows: Vec<AuditRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

/// Cost history of one product, newest first. `None` for roles that do not
/// see costs.
pub fn render_price_history(
    role: Role,
    product_id: i64,
    entries: &[PriceHistoryEntry],
) -> Option<PriceHistoryView> {
    let visibility = Visibility::for_role(role);
    if !visibility.sees_cost {
        return None;
    }

    let mut rows: Vec<(usize, PriceHistoryRow)> = entries
        .iter()
        .filter(|e| e.product_id.map_or(true, |id| id == product_id))
        .enumerate()
        .map(|(index, e)| {
            (
                index,
                PriceHistoryRow {
                    date: e.date.map(format_date),
                    old_cost: money(e.old_cost),
                    new_cost: money(e.new_cost),
                    change: money(e.new_cost - e.old_cost),
                    changed_by: e.changed_by.clone(),
                },
            )
        })
        .collect();
    // Append order breaks ties between entries of the same day.
    rows.sort_by(|(ia, a), (ib, b)| b.date.cmp(&a.date).then(ib.cmp(ia)));
    let rows: Vec<PriceHistoryRow> = rows.into_iter().map(|(_, row)| row).collect();

    Some(PriceHistoryView {
        product_id,
        empty_message: rows.is_empty().then(|| NO_HISTORY.to_string()),
        rows,
    })
}

/// Audit details routinely quote prices, so the log follows cost visibility.
pub fn render_audit_log(role: Role, entries: &[AuditLogEntry]) -> Option<AuditLogView> {
    let visibility = Visibility::for_role(role);
    if !visibility.sees_cost {
        return None;
    }

    let rows: Vec<AuditRow> = entries
        .iter()
        .rev()
        .map(|e| AuditRow {
            date: e.date.map(format_date),
            user: e.user.clone(),
            action: e.action.clone(),
            details: e.details.clone(),
        })
        .collect();

    Some(AuditLogView {
        empty_message: rows.is_empty().then(|| NO_AUDIT_ENTRIES.to_string()),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(day: u32, old: f64, new: f64) -> PriceHistoryEntry {
        PriceHistoryEntry {
            date: NaiveDate::from_ymd_opt(2024, 4, day),
            product_id: Some(7),
            old_cost: old,
            new_cost: new,
            changed_by: "admin".into(),
        }
    }

    #[test]
    fn history_is_newest_first() {
        let view = render_price_history(
            Role::Admin,
            7,
            &[entry(1, 8.0, 9.0), entry(3, 9.0, 10.0), entry(3, 10.0, 12.5)],
        )
        .unwrap();
        let costs: Vec<f64> = view.rows.iter().map(|r| r.new_cost).collect();
        assert_eq!(costs, vec![12.5, 10.0, 9.0]);
        assert_eq!(view.rows[0].change, 2.5);
    }

    #[test]
    fn history_skips_other_products() {
        let mut other = entry(2, 1.0, 2.0);
        other.product_id = Some(8);
        let view = render_price_history(Role::Mom, 7, &[other]).unwrap();
        assert!(view.rows.is_empty());
        assert_eq!(view.empty_message.as_deref(), Some(NO_HISTORY));
    }

    #[test]
    fn restricted_roles_get_nothing() {
        for role in [Role::Manager, Role::Executor] {
            assert!(render_price_history(role, 7, &[entry(1, 1.0, 2.0)]).is_none());
            assert!(render_audit_log(role, &[]).is_none());
        }
    }

    #[test]
    fn audit_log_is_newest_first() {
        let entries = vec![
            AuditLogEntry {
                date: NaiveDate::from_ymd_opt(2024, 4, 1),
                user: "admin".into(),
                action: "updateProduct".into(),
                details: "cost 10 -> 12.5".into(),
            },
            AuditLogEntry {
                date: NaiveDate::from_ymd_opt(2024, 4, 2),
                user: "manager".into(),
                action: "markDeliveryPaid".into(),
                details: "delivery 3".into(),
            },
        ];
        let view = render_audit_log(Role::Admin, &entries).unwrap();
        assert_eq!(view.rows[0].action, "markDeliveryPaid");
        assert_eq!(view.rows[1].user, "admin");
    }
}

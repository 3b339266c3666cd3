//! Pure projections of backend data for one role.
//!
//! Every view goes through [`Visibility`]: a value derived from cost (cost
//! prices, totals, margins, price changes) is only ever produced for a role
//! that sees costs. Hidden values are `None` and drop out of the serialized
//! view entirely.

pub mod analytics;
pub mod deliveries;
pub mod history;
pub mod products;

use serde::Serialize;

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Visibility {
    pub sees_cost: bool,
    pub sees_margin: bool,
    pub can_toggle_payment: bool,
    pub can_edit_prices: bool,
}

impl Visibility {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin | Role::Mom => Visibility {
                sees_cost: true,
                sees_margin: true,
                can_toggle_payment: true,
                can_edit_prices: true,
            },
            Role::Manager | Role::Executor => Visibility {
                sees_cost: false,
                sees_margin: false,
                can_toggle_payment: true,
                can_edit_prices: false,
            },
        }
    }

    pub(crate) fn cost(&self, value: f64) -> Option<f64> {
        self.sees_cost.then(|| money(value))
    }

    pub(crate) fn margin(&self, value: f64) -> Option<f64> {
        (self.sees_cost && self.sees_margin).then(|| money(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Date,
    Product,
    Items,
    Quantity,
    SellPrice,
    Sell,
    CostPrice,
    Cost,
    Margin,
    Status,
    Payment,
}

/// Rounds to whole cents for display.
pub fn money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Appends the cost and margin columns the role may see.
pub(crate) fn with_cost_columns(mut columns: Vec<Column>, visibility: &Visibility, cost: Column) -> Vec<Column> {
    if visibility.sees_cost {
        columns.push(cost);
        if visibility.sees_margin {
            columns.push(Column::Margin);
        }
    }
    columns
}

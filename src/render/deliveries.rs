use serde::Serialize;

use crate::models::{Comment, Delivery, DeliveryStatus, LineItem, PaymentStatus, Role};
use crate::render::{money, with_cost_columns, Column, Visibility};
use crate::utils::format_date;

pub const NO_DELIVERIES: &str = "no deliveries";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryRow {
    pub id: i64,
    pub date: Option<String>,
    pub item_count: usize,
    pub total_sell: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
    pub status: DeliveryStatus,
    pub payment_status: PaymentStatus,
    pub comment_count: usize,
    pub can_toggle_payment: bool,
    pub can_edit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListTotals {
    pub sell: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryListView {
    pub role: Role,
    pub columns: Vec<Column>,
    pub rows: Vec<DeliveryRow>,
    pub totals: ListTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineView {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: f64,
    pub sell_price: f64,
    pub line_sell: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub author: String,
    pub text: String,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryDetailView {
    pub role: Role,
    pub summary: DeliveryRow,
    pub columns: Vec<Column>,
    pub lines: Vec<LineView>,
    pub comments: Vec<CommentView>,
    pub can_comment: bool,
}

pub fn render_delivery_row(visibility: &Visibility, delivery: &Delivery) -> DeliveryRow {
    let totals = delivery.totals();
    DeliveryRow {
        id: delivery.id,
        date: delivery.date.map(format_date),
        item_count: delivery.items.len(),
        total_sell: money(totals.sell),
        total_cost: visibility.cost(totals.cost),
        margin: visibility.margin(totals.margin),
        status: delivery.status,
        payment_status: delivery.payment_status,
        comment_count: delivery.comments.len(),
        can_toggle_payment: visibility.can_toggle_payment,
        can_edit: visibility.can_edit_prices,
    }
}

/// Newest deliveries first; undated ones last, in backend order.
pub fn render_delivery_list(role: Role, deliveries: &[Delivery]) -> DeliveryListView {
    let visibility = Visibility::for_role(role);

    let mut ordered: Vec<&Delivery> = deliveries.iter().collect();
    ordered.sort_by(|a, b| match (a.date, b.date) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let rows: Vec<DeliveryRow> = ordered
        .into_iter()
        .map(|d| render_delivery_row(&visibility, d))
        .collect();

    let (sell, cost) = deliveries.iter().fold((0.0, 0.0), |(sell, cost), d| {
        let totals = d.totals();
        (sell + totals.sell, cost + totals.cost)
    });

    DeliveryListView {
        role,
        columns: with_cost_columns(
            vec![Column::Date, Column::Items, Column::Sell],
            &visibility,
            Column::Cost,
        )
        .into_iter()
        .chain([Column::Status, Column::Payment])
        .collect(),
        empty_message: rows.is_empty().then(|| NO_DELIVERIES.to_string()),
        rows,
        totals: ListTotals {
            sell: money(sell),
            cost: visibility.cost(cost),
            margin: visibility.margin(sell - cost),
        },
    }
}

fn render_line(visibility: &Visibility, item: &LineItem) -> LineView {
    LineView {
        product_id: item.product_id,
        product_name: item.product_name.clone(),
        quantity: item.quantity,
        sell_price: money(item.sell_price),
        line_sell: money(item.line_sell()),
        cost_price: visibility.cost(item.cost_price),
        line_cost: visibility.cost(item.line_cost()),
        line_margin: visibility.margin(item.line_sell() - item.line_cost()),
    }
}

fn render_comment(comment: &Comment) -> CommentView {
    CommentView {
        author: comment.author.clone(),
        text: comment.text.clone(),
        date: comment.date.map(format_date),
    }
}

pub fn render_delivery_detail(role: Role, delivery: &Delivery) -> DeliveryDetailView {
    let visibility = Visibility::for_role(role);
    DeliveryDetailView {
        role,
        summary: render_delivery_row(&visibility, delivery),
        columns: with_cost_columns(
            vec![Column::Product, Column::Quantity, Column::SellPrice, Column::Sell],
            &visibility,
            Column::Cost,
        ),
        lines: delivery
            .items
            .iter()
            .map(|item| render_line(&visibility, item))
            .collect(),
        comments: delivery.comments.iter().map(render_comment).collect(),
        can_comment: true,
    }
}

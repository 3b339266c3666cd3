use serde::Serialize;

use crate::models::{Product, ProductStatus, Role};
use crate::render::{money, with_cost_columns, Column, Visibility};

pub const NO_PRODUCTS: &str = "no products";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub sell_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_margin: Option<f64>,
    pub quantity: f64,
    pub status: ProductStatus,
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductListView {
    pub role: Role,
    pub columns: Vec<Column>,
    pub rows: Vec<ProductRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

/// Price editors see every product, including deactivated ones; everybody
/// else only picks from active products.
pub fn render_product_list(role: Role, products: &[Product]) -> ProductListView {
    let visibility = Visibility::for_role(role);
    let rows: Vec<ProductRow> = products
        .iter()
        .filter(|p| visibility.can_edit_prices || p.is_active())
        .map(|p| ProductRow {
            id: p.id,
            name: p.name.clone(),
            sell_price: money(p.sell_price),
            cost_price: visibility.cost(p.cost_price),
            unit_margin: visibility.margin(p.sell_price - p.cost_price),
            quantity: p.quantity,
            status: p.status,
            editable: visibility.can_edit_prices,
        })
        .collect();

    let mut columns = with_cost_columns(
        vec![Column::Product, Column::SellPrice],
        &visibility,
        Column::CostPrice,
    );
    columns.push(Column::Quantity);
    if visibility.can_edit_prices {
        columns.push(Column::Status);
    }

    ProductListView {
        role,
        columns,
        empty_message: rows.is_empty().then(|| NO_PRODUCTS.to_string()),
        rows,
    }
}

use std::str::FromStr;

use tracing::{info, warn};

use crate::commands::role_allowed;
use crate::error::{DeskError, DeskResult};
use crate::models::{EntityRef, NewProduct, PriceChange, PriceHistoryEntry, Product, ProductUpdate};
use crate::render::history::{render_price_history, PriceHistoryView};
use crate::render::products::{render_product_list, ProductListView};
use crate::services::api::Action;
use crate::services::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Cost,
    Sell,
}

impl FromStr for PriceField {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cost" | "cost_price" => Ok(PriceField::Cost),
            "sell" | "sell_price" => Ok(PriceField::Sell),
            other => Err(DeskError::InvalidAmount(format!("unknown price field {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductInput {
    pub name: String,
    pub cost_price: f64,
    pub sell_price: f64,
    pub quantity: f64,
}

fn check_amount(label: &str, value: f64) -> DeskResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(DeskError::InvalidAmount(format!("{} {}", label, value)))
    }
}

async fn fetch_products(state: &AppState) -> DeskResult<Vec<Product>> {
    state.backend.call(&Action::GetProducts).await.into_data()
}

pub async fn load_products(state: &AppState) -> DeskResult<ProductListView> {
    let role = state.role()?;
    let products = fetch_products(state).await?;
    Ok(render_product_list(role, &products))
}

/// Changes one price of a product. A cost change is first written to the
/// price history; the price itself is only updated once that entry exists.
pub async fn update_product(
    state: &AppState,
    id: i64,
    field: PriceField,
    value: f64,
) -> DeskResult<ProductListView> {
    let role = role_allowed(state, |v| v.can_edit_prices)?;
    let value = check_amount("price", value)?;

    let mut product = fetch_products(state)
        .await?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or(DeskError::ProductNotFound(id))?;

    match field {
        PriceField::Cost => {
            let old_cost = product.cost_price;
            if old_cost != value {
                let change = PriceChange {
                    product_id: id,
                    old_cost,
                    new_cost: value,
                    changed_by: role,
                };
                state
                    .backend
                    .call(&Action::LogPriceChange(change))
                    .await
                    .into_confirmed()
                    .map_err(|err| {
                        warn!(product_id = id, "price history not written, price left unchanged");
                        err
                    })?;
                info!(product_id = id, old_cost, new_cost = value, "cost change logged");
            }
            product.cost_price = value;
        }
        PriceField::Sell => product.sell_price = value,
    }

    state
        .backend
        .call(&Action::UpdateProduct(ProductUpdate {
            product,
            updated_by: role,
        }))
        .await
        .into_confirmed()?;
    info!(role = %role, product_id = id, ?field, "product updated");

    load_products(state).await
}

pub async fn add_product(state: &AppState, input: ProductInput) -> DeskResult<ProductListView> {
    let role = role_allowed(state, |v| v.can_edit_prices)?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(DeskError::EmptyProductName);
    }

    let payload = NewProduct {
        name: name.to_string(),
        cost_price: check_amount("cost", input.cost_price)?,
        sell_price: check_amount("sell", input.sell_price)?,
        quantity: check_amount("quantity", input.quantity)?,
        created_by: role,
    };
    state
        .backend
        .call(&Action::AddProduct(payload))
        .await
        .into_confirmed()?;
    info!(role = %role, name, "product added");

    load_products(state).await
}

/// Flips a product between active and inactive. Products are never deleted.
pub async fn toggle_product_status(state: &AppState, id: i64) -> DeskResult<ProductListView> {
    let role = role_allowed(state, |v| v.can_edit_prices)?;
    state
        .backend
        .call(&Action::ToggleProductStatus(EntityRef { id, changed_by: role }))
        .await
        .into_confirmed()?;
    info!(role = %role, product_id = id, "product status toggled");

    load_products(state).await
}

pub async fn load_price_history(state: &AppState, product_id: i64) -> DeskResult<PriceHistoryView> {
    let role = role_allowed(state, |v| v.sees_cost)?;
    let entries: Vec<PriceHistoryEntry> = state
        .backend
        .call(&Action::GetPriceHistory { product_id })
        .await
        .into_data()?;
    render_price_history(role, product_id, &entries).ok_or(DeskError::Forbidden(role))
}

use chrono::NaiveDate;
use tracing::info;

use crate::commands::role_allowed;
use crate::error::{DeskError, DeskResult};
use crate::models::{Delivery, EntityRef, LineItem, NewComment, NewDelivery, Product, Role};
use crate::render::deliveries::{
    render_delivery_detail, render_delivery_list, DeliveryDetailView, DeliveryListView,
};
use crate::services::api::Action;
use crate::services::state::AppState;
use crate::utils::normalize_date;

/// A delivery being put together. Each line keeps the product's prices as
/// they were when the line was added.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryDraft {
    pub date: String,
    pub lines: Vec<DraftLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftLine {
    pub item: LineItem,
    pub active: bool,
}

impl DeliveryDraft {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            lines: Vec::new(),
        }
    }

    pub fn add_line(&mut self, product: &Product, quantity: f64) -> &mut Self {
        self.lines.push(DraftLine {
            item: LineItem {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity,
                cost_price: product.cost_price,
                sell_price: product.sell_price,
            },
            active: product.is_active(),
        });
        self
    }

    /// Normalized date and the lines worth sending. Lines without a positive
    /// quantity are dropped.
    pub fn validate(&self) -> DeskResult<(NaiveDate, Vec<LineItem>)> {
        let date = require_delivery_date(&self.date)?;

        let mut items = Vec::new();
        for line in self.lines.iter().filter(|l| l.item.quantity > 0.0) {
            if !line.active {
                return Err(DeskError::InactiveProduct(line.item.product_name.clone()));
            }
            items.push(line.item.clone());
        }
        if items.is_empty() {
            return Err(DeskError::NoDeliveryItems);
        }
        Ok((date, items))
    }
}

fn require_delivery_date(raw: &str) -> DeskResult<NaiveDate> {
    normalize_date(raw).ok_or(DeskError::MissingDeliveryDate)
}

pub async fn load_deliveries(state: &AppState) -> DeskResult<DeliveryListView> {
    let role = state.role()?;
    let deliveries: Vec<Delivery> = state.backend.call(&Action::GetDeliveries).await.into_data()?;
    Ok(render_delivery_list(role, &deliveries))
}

pub async fn load_delivery(state: &AppState, id: i64) -> DeskResult<DeliveryDetailView> {
    let role = state.role()?;
    let delivery: Delivery = state
        .backend
        .call(&Action::GetDelivery { id })
        .await
        .into_data()?;
    Ok(render_delivery_detail(role, &delivery))
}

/// Validates locally, submits, and returns the refreshed delivery list.
/// Nothing is sent when the draft is invalid.
pub async fn create_delivery(state: &AppState, draft: &DeliveryDraft) -> DeskResult<DeliveryListView> {
    let role = state.role()?;
    let (date, items) = draft.validate()?;

    let payload = NewDelivery {
        date,
        items,
        created_by: role,
    };
    state
        .backend
        .call(&Action::CreateDelivery(payload))
        .await
        .into_confirmed()?;
    info!(role = %role, %date, "delivery created");

    load_deliveries(state).await
}

/// Builds the draft from product ids and quantities, snapshotting the
/// current product prices. The date and quantities are checked before
/// products are fetched.
pub async fn create_delivery_with_quantities(
    state: &AppState,
    date: &str,
    quantities: &[(i64, f64)],
) -> DeskResult<DeliveryListView> {
    state.role()?;
    require_delivery_date(date)?;
    if !quantities.iter().any(|(_, qty)| *qty > 0.0) {
        return Err(DeskError::NoDeliveryItems);
    }

    let products: Vec<Product> = state.backend.call(&Action::GetProducts).await.into_data()?;
    let mut draft = DeliveryDraft::new(date);
    for (id, qty) in quantities {
        let product = products
            .iter()
            .find(|p| p.id == *id)
            .ok_or(DeskError::ProductNotFound(*id))?;
        draft.add_line(product, *qty);
    }

    create_delivery(state, &draft).await
}

async fn set_payment(state: &AppState, id: i64, paid: bool) -> DeskResult<DeliveryDetailView> {
    let role = role_allowed(state, |v| v.can_toggle_payment)?;
    let target = EntityRef { id, changed_by: role };
    let action = if paid {
        Action::MarkDeliveryPaid(target)
    } else {
        Action::MarkDeliveryUnpaid(target)
    };
    state.backend.call(&action).await.into_confirmed()?;
    info!(role = %role, delivery_id = id, paid, "payment status set");

    load_delivery(state, id).await
}

pub async fn mark_delivery_paid(state: &AppState, id: i64) -> DeskResult<DeliveryDetailView> {
    set_payment(state, id, true).await
}

pub async fn mark_delivery_unpaid(state: &AppState, id: i64) -> DeskResult<DeliveryDetailView> {
    set_payment(state, id, false).await
}

pub async fn add_comment(state: &AppState, delivery_id: i64, text: &str) -> DeskResult<DeliveryDetailView> {
    let role: Role = state.role()?;
    let text = text.trim();
    if text.is_empty() {
        return Err(DeskError::EmptyComment);
    }

    let payload = NewComment {
        delivery_id,
        author: role,
        text: text.to_string(),
    };
    state
        .backend
        .call(&Action::AddComment(payload))
        .await
        .into_confirmed()?;
    info!(role = %role, delivery_id, "comment added");

    load_delivery(state, delivery_id).await
}

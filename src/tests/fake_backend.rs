use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::db::Database;
use crate::models::{
    Analytics, AuditLogEntry, Comment, Delivery, DeliveryStatus, PaymentStatus, PriceHistoryEntry,
    Product, ProductStatus, Role,
};
use crate::services::api::{Action, ApiResponse, Backend};
use crate::services::state::AppState;
use crate::utils::today;

/// In-memory stand-in for the spreadsheet backend. Records every action and
/// keeps just enough state for refetches to reflect mutations.
#[derive(Default)]
pub(crate) struct FakeBackend {
    pub calls: Mutex<Vec<Action>>,
    pub products: Mutex<Vec<Product>>,
    pub deliveries: Mutex<Vec<Delivery>>,
    pub history: Mutex<Vec<PriceHistoryEntry>>,
    pub audit: Mutex<Vec<AuditLogEntry>>,
    pub analytics: Mutex<Option<Analytics>>,
    pub failing: Mutex<HashSet<&'static str>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_products(products: Vec<Product>) -> Arc<Self> {
        let backend = Self::default();
        *backend.products.lock().unwrap() = products;
        Arc::new(backend)
    }

    pub fn fail(&self, action: &'static str) {
        self.failing.lock().unwrap().insert(action);
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(Action::name).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn respond(&self, action: &Action) -> ApiResponse {
        match action {
            Action::GetDeliveries => to_ok(&*self.deliveries.lock().unwrap()),
            Action::GetDelivery { id } => match self.deliveries.lock().unwrap().iter().find(|d| d.id == *id) {
                Some(delivery) => to_ok(delivery),
                None => ApiResponse::failure("Delivery not found"),
            },
            Action::CreateDelivery(payload) => {
                let mut deliveries = self.deliveries.lock().unwrap();
                let id = deliveries.len() as i64 + 1;
                deliveries.push(Delivery {
                    id,
                    date: Some(payload.date),
                    items: payload.items.clone(),
                    status: DeliveryStatus::Draft,
                    payment_status: PaymentStatus::Unpaid,
                    comments: Vec::new(),
                    created_by: payload.created_by.to_string(),
                    total_cost: None,
                    total_sell: None,
                });
                ApiResponse::ok(json!({ "id": id }))
            }
            Action::GetProducts => to_ok(&*self.products.lock().unwrap()),
            Action::AddProduct(payload) => {
                let mut products = self.products.lock().unwrap();
                let id = products.iter().map(|p| p.id).max().unwrap_or(0) + 1;
                products.push(Product {
                    id,
                    name: payload.name.clone(),
                    cost_price: payload.cost_price,
                    sell_price: payload.sell_price,
                    quantity: payload.quantity,
                    status: ProductStatus::Active,
                });
                ApiResponse::ok(json!({ "id": id }))
            }
            Action::UpdateProduct(update) => {
                let mut products = self.products.lock().unwrap();
                match products.iter_mut().find(|p| p.id == update.product.id) {
                    Some(product) => {
                        *product = update.product.clone();
                        ApiResponse::ok(Value::Null)
                    }
                    None => ApiResponse::failure("Product not found"),
                }
            }
            Action::ToggleProductStatus(target) => {
                let mut products = self.products.lock().unwrap();
                match products.iter_mut().find(|p| p.id == target.id) {
                    Some(product) => {
                        product.status = if product.is_active() {
                            ProductStatus::Inactive
                        } else {
                            ProductStatus::Active
                        };
                        ApiResponse::ok(Value::Null)
                    }
                    None => ApiResponse::failure("Product not found"),
                }
            }
            Action::GetPriceHistory { .. } => to_ok(&*self.history.lock().unwrap()),
            Action::LogPriceChange(change) => {
                self.history.lock().unwrap().push(PriceHistoryEntry {
                    date: Some(today()),
                    product_id: Some(change.product_id),
                    old_cost: change.old_cost,
                    new_cost: change.new_cost,
                    changed_by: change.changed_by.to_string(),
                });
                ApiResponse::ok(Value::Null)
            }
            Action::MarkDeliveryPaid(target) => self.set_payment(target.id, PaymentStatus::Paid),
            Action::MarkDeliveryUnpaid(target) => self.set_payment(target.id, PaymentStatus::Unpaid),
            Action::AddComment(comment) => {
                let mut deliveries = self.deliveries.lock().unwrap();
                match deliveries.iter_mut().find(|d| d.id == comment.delivery_id) {
                    Some(delivery) => {
                        delivery.comments.push(Comment {
                            author: comment.author.to_string(),
                            text: comment.text.clone(),
                            date: Some(today()),
                        });
                        ApiResponse::ok(Value::Null)
                    }
                    None => ApiResponse::failure("Delivery not found"),
                }
            }
            Action::GetAuditLog => to_ok(&*self.audit.lock().unwrap()),
            Action::GetAnalytics { .. } => match &*self.analytics.lock().unwrap() {
                Some(analytics) => to_ok(analytics),
                None => ApiResponse::ok(json!({})),
            },
        }
    }

    fn set_payment(&self, id: i64, status: PaymentStatus) -> ApiResponse {
        let mut deliveries = self.deliveries.lock().unwrap();
        match deliveries.iter_mut().find(|d| d.id == id) {
            Some(delivery) => {
                delivery.payment_status = status;
                ApiResponse::ok(Value::Null)
            }
            None => ApiResponse::failure("Delivery not found"),
        }
    }
}

fn to_ok<T: serde::Serialize + ?Sized>(value: &T) -> ApiResponse {
    ApiResponse::ok(serde_json::to_value(value).unwrap())
}

#[async_trait]
impl Backend for FakeBackend {
    async fn call(&self, action: &Action) -> ApiResponse {
        self.calls.lock().unwrap().push(action.clone());
        if self.failing.lock().unwrap().contains(action.name()) {
            return ApiResponse::failure("backend unavailable");
        }
        self.respond(action)
    }
}

pub(crate) fn product(id: i64, name: &str, cost: f64, sell: f64) -> Product {
    Product {
        id,
        name: name.to_string(),
        cost_price: cost,
        sell_price: sell,
        quantity: 10.0,
        status: ProductStatus::Active,
    }
}

pub(crate) fn logged_out(backend: Arc<FakeBackend>) -> AppState {
    let db = Database::open_in_memory().unwrap();
    AppState::init(db, backend).unwrap()
}

/// A state logged in as `role`, with no backend calls made yet.
pub(crate) fn logged_in(role: Role, backend: Arc<FakeBackend>) -> AppState {
    let mut state = logged_out(backend);
    state.session.set_password(role, "secret").unwrap();
    state.session.login(role.as_str(), "secret").unwrap();
    state
}

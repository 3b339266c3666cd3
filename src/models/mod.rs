use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::utils::{normalize_date, parse_decimal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    #[serde(alias = "home")]
    Mom,
    Executor,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::Mom, Role::Executor];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Mom => "mom",
            Role::Executor => "executor",
        }
    }

    /// Page shown right after login or a restored session.
    pub fn landing_page(self) -> Page {
        match self {
            Role::Admin => Page::Admin,
            Role::Manager => Page::Manager,
            Role::Mom | Role::Executor => Page::Home,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "mom" | "home" => Ok(Role::Mom),
            "executor" => Ok(Role::Executor),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Login,
    Admin,
    Manager,
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Unpaid,
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "paid" => PaymentStatus::Paid,
            _ => PaymentStatus::Unpaid,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Draft,
    Completed,
    Other,
}

impl<'de> Deserialize<'de> for DeliveryStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
            None => DeliveryStatus::Draft,
            Some(s) if s.is_empty() || s == "draft" => DeliveryStatus::Draft,
            Some(s) if s == "completed" || s == "done" => DeliveryStatus::Completed,
            Some(_) => DeliveryStatus::Other,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
}

impl<'de> Deserialize<'de> for ProductStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("inactive") => {
                ProductStatus::Inactive
            }
            Some(Value::Bool(false)) => ProductStatus::Inactive,
            _ => ProductStatus::Active,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(deserialize_with = "de_id")]
    pub product_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_name: String,
    #[serde(deserialize_with = "de_amount")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub cost_price: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub sell_price: f64,
}

impl LineItem {
    pub fn line_cost(&self) -> f64 {
        self.cost_price * self.quantity
    }

    pub fn line_sell(&self) -> f64 {
        self.sell_price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "de_date")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(deserialize_with = "de_id")]
    pub id: i64,
    #[serde(default, deserialize_with = "de_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub status: DeliveryStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<Comment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_by: String,
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub total_cost: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub total_sell: Option<f64>,
}

/// Aggregates of a delivery. Margin is always sell minus cost, never taken
/// from the server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryTotals {
    pub cost: f64,
    pub sell: f64,
    pub margin: f64,
}

impl Delivery {
    /// Totals from the line items when present, otherwise from the
    /// server-provided aggregates (the list endpoint may omit items).
    pub fn totals(&self) -> DeliveryTotals {
        let (cost, sell) = if self.items.is_empty() {
            (self.total_cost.unwrap_or(0.0), self.total_sell.unwrap_or(0.0))
        } else {
            self.items.iter().fold((0.0, 0.0), |(cost, sell), item| {
                (cost + item.line_cost(), sell + item.line_sell())
            })
        };
        DeliveryTotals {
            cost,
            sell,
            margin: sell - cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(deserialize_with = "de_id")]
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "de_amount")]
    pub cost_price: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub sell_price: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub quantity: f64,
    #[serde(default)]
    pub status: ProductStatus,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    #[serde(default, deserialize_with = "de_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub product_id: Option<i64>,
    #[serde(deserialize_with = "de_amount")]
    pub old_cost: f64,
    #[serde(deserialize_with = "de_amount")]
    pub new_cost: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub changed_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    #[serde(default, deserialize_with = "de_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: String,
    #[serde(default, deserialize_with = "de_details")]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAnalytics {
    pub month: String,
    #[serde(default, deserialize_with = "de_count")]
    pub delivery_count: u32,
    #[serde(default, deserialize_with = "de_amount")]
    pub total_cost: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub total_sell: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    #[serde(default, deserialize_with = "de_count")]
    pub delivery_count: u32,
    #[serde(default, deserialize_with = "de_amount")]
    pub total_cost: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub total_sell: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub paid_total: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub unpaid_total: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub monthly: Vec<MonthlyAnalytics>,
}

/// Payload of `createDelivery`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDelivery {
    pub date: NaiveDate,
    pub items: Vec<LineItem>,
    pub created_by: Role,
}

/// Payload of `addProduct`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProduct {
    pub name: String,
    pub cost_price: f64,
    pub sell_price: f64,
    pub quantity: f64,
    pub created_by: Role,
}

/// Payload of `logPriceChange`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceChange {
    pub product_id: i64,
    pub old_cost: f64,
    pub new_cost: f64,
    pub changed_by: Role,
}

/// Payload of `updateProduct`: the full product plus who changed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductUpdate {
    #[serde(flatten)]
    pub product: Product,
    pub updated_by: Role,
}

/// Payload of `addComment`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewComment {
    pub delivery_id: i64,
    pub author: Role,
    pub text: String,
}

/// Payload of `markDeliveryPaid`, `markDeliveryUnpaid` and `toggleProductStatus`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRef {
    pub id: i64,
    pub changed_by: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub api_url: String,
    pub currency_symbol: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000/api/proxy".to_string(),
            currency_symbol: "₾".to_string(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn amount_from_value(value: Option<Value>) -> Result<Option<f64>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => parse_decimal(&s).map(Some).map_err(|e| e.to_string()),
        Some(other) => Err(format!("expected an amount, got {}", other)),
    }
}

fn de_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    amount_from_value(value)
        .map(|v| v.unwrap_or(0.0))
        .map_err(serde::de::Error::custom)
}

fn de_opt_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    amount_from_value(value).map_err(serde::de::Error::custom)
}

fn de_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    de_amount(deserializer).map(|v| if v > 0.0 { v.round() as u32 } else { 0 })
}

fn id_from_value(value: Option<Value>) -> Result<Option<i64>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| format!("invalid id {}", n)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("invalid id {:?}", s)),
        Some(other) => Err(format!("invalid id {}", other)),
    }
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    id_from_value(value)
        .map_err(serde::de::Error::custom)?
        .ok_or_else(|| serde::de::Error::custom("missing id"))
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    id_from_value(value).map_err(serde::de::Error::custom)
}

fn de_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => normalize_date(&s),
        _ => None,
    })
}

fn de_details<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

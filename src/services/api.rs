use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use jsonschema::JSONSchema;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{DeskError, DeskResult};
use crate::models::{EntityRef, NewComment, NewDelivery, NewProduct, PriceChange, ProductUpdate};
use crate::utils::format_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Every action the backend understands, with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    GetDeliveries,
    GetDelivery { id: i64 },
    CreateDelivery(NewDelivery),
    GetProducts,
    AddProduct(NewProduct),
    UpdateProduct(ProductUpdate),
    ToggleProductStatus(EntityRef),
    GetPriceHistory { product_id: i64 },
    LogPriceChange(PriceChange),
    MarkDeliveryPaid(EntityRef),
    MarkDeliveryUnpaid(EntityRef),
    AddComment(NewComment),
    GetAuditLog,
    GetAnalytics { date_from: NaiveDate, date_to: NaiveDate },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::GetDeliveries => "getDeliveries",
            Action::GetDelivery { .. } => "getDelivery",
            Action::CreateDelivery(_) => "createDelivery",
            Action::GetProducts => "getProducts",
            Action::AddProduct(_) => "addProduct",
            Action::UpdateProduct(_) => "updateProduct",
            Action::ToggleProductStatus(_) => "toggleProductStatus",
            Action::GetPriceHistory { .. } => "getPriceHistory",
            Action::LogPriceChange(_) => "logPriceChange",
            Action::MarkDeliveryPaid(_) => "markDeliveryPaid",
            Action::MarkDeliveryUnpaid(_) => "markDeliveryUnpaid",
            Action::AddComment(_) => "addComment",
            Action::GetAuditLog => "getAuditLog",
            Action::GetAnalytics { .. } => "getAnalytics",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Action::GetDeliveries
            | Action::GetDelivery { .. }
            | Action::GetProducts
            | Action::GetPriceHistory { .. }
            | Action::GetAuditLog
            | Action::GetAnalytics { .. } => Method::Get,
            _ => Method::Post,
        }
    }

    /// Query parameters sent next to `action` on GET requests.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Action::GetDelivery { id } => vec![("id", id.to_string())],
            Action::GetPriceHistory { product_id } => vec![("product_id", product_id.to_string())],
            Action::GetAnalytics { date_from, date_to } => vec![
                ("dateFrom", format_date(*date_from)),
                ("dateTo", format_date(*date_to)),
            ],
            _ => Vec::new(),
        }
    }

    /// JSON body of POST requests.
    pub fn body(&self) -> serde_json::Result<Option<Value>> {
        let value = match self {
            Action::CreateDelivery(payload) => serde_json::to_value(payload)?,
            Action::AddProduct(payload) => serde_json::to_value(payload)?,
            Action::UpdateProduct(payload) => serde_json::to_value(payload)?,
            Action::ToggleProductStatus(payload)
            | Action::MarkDeliveryPaid(payload)
            | Action::MarkDeliveryUnpaid(payload) => serde_json::to_value(payload)?,
            Action::LogPriceChange(payload) => serde_json::to_value(payload)?,
            Action::AddComment(payload) => serde_json::to_value(payload)?,
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

/// Uniform result of a backend call. Transport and parse failures are folded
/// into `success: false` instead of being raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Builds a response from a decoded body. Anything without a boolean
    /// `success` flag counts as a failure.
    pub fn from_body(body: Value, schema: &JSONSchema) -> Self {
        let error = body.get("error").and_then(|e| match e {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        if !schema.is_valid(&body) {
            return Self::failure(error.unwrap_or_else(|| "malformed response".to_string()));
        }

        if body.get("success").and_then(Value::as_bool) == Some(true) {
            Self {
                success: true,
                data: body.get("data").cloned(),
                error: None,
            }
        } else {
            Self::failure(error.unwrap_or_else(|| "request failed".to_string()))
        }
    }

    fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "request failed".to_string())
    }

    /// Decodes `data` of a read action.
    pub fn into_data<T: DeserializeOwned>(self) -> DeskResult<T> {
        if !self.success {
            return Err(DeskError::Load(self.error_message()));
        }
        serde_json::from_value(self.data.unwrap_or(Value::Null))
            .map_err(|e| DeskError::Load(format!("unexpected data: {}", e)))
    }

    /// Confirms a mutating action.
    pub fn into_confirmed(self) -> DeskResult<Option<Value>> {
        if !self.success {
            return Err(DeskError::Update(self.error_message()));
        }
        Ok(self.data)
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Issues one action. Never retries and never fails: problems come back
    /// as an unsuccessful [`ApiResponse`].
    async fn call(&self, action: &Action) -> ApiResponse;
}

pub fn envelope_schema() -> Result<JSONSchema> {
    let schema = json!({
        "type": "object",
        "required": ["success"],
        "properties": {
            "success": {"type": "boolean"},
            "error": {"type": ["string", "object", "null"]}
        }
    });

    JSONSchema::compile(&schema).map_err(|e| anyhow!("Invalid response schema: {}", e))
}

/// Talks to the spreadsheet API through the same-origin proxy.
pub struct HttpBackend {
    http: Client,
    endpoint: Url,
    schema: JSONSchema,
}

impl HttpBackend {
    pub fn new(api_url: &str) -> Result<Self> {
        let endpoint = Url::parse(api_url).map_err(|e| anyhow!("Invalid API URL {}: {}", api_url, e))?;
        Ok(Self {
            http: Client::new(),
            endpoint,
            schema: envelope_schema()?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn request_url(&self, action: &Action) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("action", action.name());
            if action.method() == Method::Get {
                for (key, value) in action.query() {
                    pairs.append_pair(key, &value);
                }
            }
        }
        url
    }

    async fn send(&self, action: &Action, request_id: Uuid) -> Result<ApiResponse> {
        let url = self.request_url(action);
        let request = match action.method() {
            Method::Get => self.http.get(url),
            Method::Post => {
                let body = action.body()?.unwrap_or(Value::Null);
                self.http.post(url).json(&body)
            }
        };

        let response = request
            .header("X-Request-Id", request_id.to_string())
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Invalid JSON (HTTP {}): {}", status, e))?;
        Ok(ApiResponse::from_body(body, &self.schema))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn call(&self, action: &Action) -> ApiResponse {
        let request_id = Uuid::new_v4();
        debug!(action = action.name(), %request_id, "backend call");

        let response = match self.send(action, request_id).await {
            Ok(response) => response,
            Err(err) => ApiResponse::failure(err.to_string()),
        };

        if response.success {
            info!(action = action.name(), %request_id, "backend call succeeded");
        } else {
            warn!(
                action = action.name(),
                %request_id,
                error = response.error.as_deref().unwrap_or(""),
                "backend call failed"
            );
        }
        response
    }
}

use thiserror::Error;

use crate::models::Role;

/// Every failure a page operation can surface. None of them is fatal: callers
/// show [`DeskError::user_message`] and stay on the current page.
#[derive(Debug, Error)]
pub enum DeskError {
    #[error("error loading: {0}")]
    Load(String),
    #[error("error updating: {0}")]
    Update(String),

    #[error("select delivery date")]
    MissingDeliveryDate,
    #[error("add at least one product with a quantity above zero")]
    NoDeliveryItems,
    #[error("product {0} is inactive")]
    InactiveProduct(String),
    #[error("comment text is empty")]
    EmptyComment,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("product name is empty")]
    EmptyProductName,
    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange { from: String, to: String },
    #[error("product {0} not found")]
    ProductNotFound(i64),

    #[error("invalid password")]
    InvalidCredentials,
    #[error("please log in")]
    NotLoggedIn,
    #[error("not permitted for role {0}")]
    Forbidden(Role),

    #[error("local storage: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("local storage lock poisoned")]
    StorageLock,
    #[error("{0}")]
    Internal(String),
}

impl DeskError {
    /// Text shown to the user. Backend details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            DeskError::Load(_) => "error loading".to_string(),
            DeskError::Update(_) => "error updating".to_string(),
            DeskError::Storage(_) | DeskError::StorageLock | DeskError::Internal(_) => {
                "something went wrong".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DeskError::MissingDeliveryDate
                | DeskError::NoDeliveryItems
                | DeskError::InactiveProduct(_)
                | DeskError::EmptyComment
                | DeskError::InvalidAmount(_)
                | DeskError::InvalidDate(_)
                | DeskError::EmptyProductName
                | DeskError::InvalidDateRange { .. }
        )
    }
}

pub type DeskResult<T> = Result<T, DeskError>;

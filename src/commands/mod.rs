//! Page operations. Reads fetch and render; mutations send one action and
//! then re-render from a full refetch, never from local guesses.

pub mod audit;
pub mod dashboard;
pub mod deliveries;
pub mod products;
pub mod session;

use crate::error::{DeskError, DeskResult};
use crate::models::Role;
use crate::render::Visibility;
use crate::services::state::AppState;

/// Current role, provided the rule table grants `allowed`.
pub(crate) fn role_allowed(state: &AppState, allowed: impl Fn(&Visibility) -> bool) -> DeskResult<Role> {
    let role = state.role()?;
    if allowed(&Visibility::for_role(role)) {
        Ok(role)
    } else {
        Err(DeskError::Forbidden(role))
    }
}

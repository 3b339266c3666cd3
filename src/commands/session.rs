use serde::Serialize;
use url::Url;

use crate::commands::role_allowed;
use crate::db::SessionLogEntry;
use crate::error::{DeskError, DeskResult};
use crate::models::{Page, Role};
use crate::services::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub role: Option<Role>,
    pub page: Page,
    pub last_role: Option<Role>,
}

pub fn login(state: &mut AppState, role: &str, password: &str) -> DeskResult<SessionInfo> {
    let role = state.session.login(role, password)?;
    Ok(SessionInfo {
        role: Some(role),
        page: role.landing_page(),
        last_role: Some(role),
    })
}

pub fn logout(state: &mut AppState) -> DeskResult<SessionInfo> {
    state.session.logout()?;
    whoami(state)
}

pub fn whoami(state: &AppState) -> DeskResult<SessionInfo> {
    let role = state.session.current_role();
    Ok(SessionInfo {
        role,
        page: role.map_or(Page::Login, Role::landing_page),
        last_role: state.session.last_role()?,
    })
}

/// Sets a role password. The first password may be set freely; after that
/// only a logged-in admin may change them.
pub fn set_password(state: &AppState, role: Role, password: &str) -> DeskResult<()> {
    if password.is_empty() {
        return Err(DeskError::InvalidCredentials);
    }

    let configured = !state.session.configured_roles()?.is_empty();
    if configured && state.session.current_role() != Some(Role::Admin) {
        return Err(match state.session.current_role() {
            Some(current) => DeskError::Forbidden(current),
            None => DeskError::NotLoggedIn,
        });
    }

    state.session.set_password(role, password)
}

pub fn set_api_url(state: &mut AppState, api_url: &str) -> DeskResult<()> {
    Url::parse(api_url).map_err(|e| DeskError::Internal(format!("invalid API URL: {}", e)))?;
    state.save_setting("api_url", api_url)
}

pub fn set_currency_symbol(state: &mut AppState, symbol: &str) -> DeskResult<()> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(DeskError::Internal("currency symbol is empty".to_string()));
    }
    state.save_setting("currency_symbol", symbol)
}

/// Recent logins, logouts and password changes on this machine.
pub fn session_log(state: &AppState, limit: usize) -> DeskResult<Vec<SessionLogEntry>> {
    role_allowed(state, |v| v.can_edit_prices)?;
    state.session.recent_events(limit)
}

use crate::commands::role_allowed;
use crate::error::{DeskError, DeskResult};
use crate::models::AuditLogEntry;
use crate::render::history::{render_audit_log, AuditLogView};
use crate::services::api::Action;
use crate::services::state::AppState;

pub async fn load_audit_log(state: &AppState) -> DeskResult<AuditLogView> {
    let role = role_allowed(state, |v| v.sees_cost)?;
    let entries: Vec<AuditLogEntry> = state.backend.call(&Action::GetAuditLog).await.into_data()?;
    render_audit_log(role, &entries).ok_or(DeskError::Forbidden(role))
}

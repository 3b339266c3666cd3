use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::db::Database;
use crate::error::{DeskError, DeskResult};
use crate::models::{Role, Settings};
use crate::services::api::Backend;
use crate::services::session::Session;

pub const API_URL_ENV: &str = "DELIVERY_DESK_API_URL";

/// Everything a page operation needs: the backend, the session and the
/// client settings.
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub settings: Settings,
    pub session: Session,
    pub backend: Arc<dyn Backend>,
}

impl AppState {
    /// Loads settings and restores any persisted session.
    pub fn init(db: Database, backend: Arc<dyn Backend>) -> DeskResult<Self> {
        let settings = load_settings(&db)?;
        let db = Arc::new(Mutex::new(db));
        let session = Session::init(db.clone())?;
        Ok(AppState {
            db,
            settings,
            session,
            backend,
        })
    }

    pub fn role(&self) -> DeskResult<Role> {
        self.session.require_role()
    }

    pub fn save_setting(&mut self, key: &str, value: &str) -> DeskResult<()> {
        {
            let db = self.db.lock().map_err(|_| DeskError::StorageLock)?;
            db.set_setting(key, value)?;
            self.settings = load_settings(&db)?;
        }
        debug!(key, "setting saved");
        Ok(())
    }
}

/// Stored settings over defaults, with the API URL overridable from the
/// environment.
pub fn load_settings(db: &Database) -> DeskResult<Settings> {
    let defaults = Settings::default();
    let api_url = std::env::var(API_URL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or(db.get_setting("api_url")?)
        .unwrap_or(defaults.api_url);
    let currency_symbol = db
        .get_setting("currency_symbol")?
        .unwrap_or(defaults.currency_symbol);
    Ok(Settings {
        api_url,
        currency_symbol,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_currency_overrides_the_default() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(load_settings(&db).unwrap().currency_symbol, "₾");

        db.set_setting("currency_symbol", "€").unwrap();
        assert_eq!(load_settings(&db).unwrap().currency_symbol, "€");
    }
}

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::db::{Database, SessionLogEntry};
use crate::error::{DeskError, DeskResult};
use crate::models::Role;
use crate::services::crypto::CryptoService;
use crate::utils::sha256_hex;

const SESSION_ROLE: &str = "session.role";
const SESSION_FINGERPRINT: &str = "session.fingerprint";
const LAST_ROLE: &str = "session.last_role";
const SECRET_PREFIX: &str = "secret.";

/// The authenticated role and its persisted copy. Only this type mutates
/// them; renderers and commands read the role through [`Session::require_role`].
pub struct Session {
    db: Arc<Mutex<Database>>,
    current: Option<Role>,
}

impl Session {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Session { db, current: None }
    }

    /// Creates the session and picks up a still-valid persisted login.
    pub fn init(db: Arc<Mutex<Database>>) -> DeskResult<Self> {
        let mut session = Self::new(db);
        session.restore_session()?;
        Ok(session)
    }

    pub fn current_role(&self) -> Option<Role> {
        self.current
    }

    pub fn require_role(&self) -> DeskResult<Role> {
        self.current.ok_or(DeskError::NotLoggedIn)
    }

    /// Checks `password` against the role's configured secret. A failed
    /// attempt leaves both the in-memory and the persisted session untouched,
    /// and an unknown role fails exactly like a wrong password.
    pub fn login(&mut self, role: &str, password: &str) -> DeskResult<Role> {
        let db = self.lock()?;

        let verified = role.parse::<Role>().ok().and_then(|role| {
            let stored = db.get_setting(&secret_key(role)).ok().flatten()?;
            CryptoService::verify_password(password, &stored).then_some((role, stored))
        });

        let Some((role, stored)) = verified else {
            db.log_session(None, "login", "failed")?;
            warn!("login rejected");
            return Err(DeskError::InvalidCredentials);
        };

        db.set_setting(SESSION_ROLE, role.as_str())?;
        db.set_setting(SESSION_FINGERPRINT, &fingerprint(role, &stored))?;
        db.set_setting(LAST_ROLE, role.as_str())?;
        db.log_session(Some(role.as_str()), "login", "success")?;
        drop(db);

        self.current = Some(role);
        info!(role = %role, "logged in");
        Ok(role)
    }

    /// Clears the current and the persisted session. Safe to call twice.
    pub fn logout(&mut self) -> DeskResult<()> {
        let db = self.lock()?;
        db.delete_setting(SESSION_ROLE)?;
        db.delete_setting(SESSION_FINGERPRINT)?;
        if let Some(role) = self.current {
            db.log_session(Some(role.as_str()), "logout", "success")?;
            info!(role = %role, "logged out");
        }
        drop(db);

        self.current = None;
        Ok(())
    }

    /// Adopts the persisted role if it is a known role whose secret has not
    /// changed since login. A stale session is wiped.
    pub fn restore_session(&mut self) -> DeskResult<Option<Role>> {
        let db = self.lock()?;
        let Some(saved) = db.get_setting(SESSION_ROLE)? else {
            return Ok(None);
        };

        let saved_fingerprint = db.get_setting(SESSION_FINGERPRINT)?;
        let restored = saved.parse::<Role>().ok().filter(|role| {
            let stored = db.get_setting(&secret_key(*role)).ok().flatten();
            match (stored, saved_fingerprint.as_deref()) {
                (Some(stored), Some(saved)) => fingerprint(*role, &stored) == saved,
                _ => false,
            }
        });

        match restored {
            Some(role) => {
                db.log_session(Some(role.as_str()), "restore", "success")?;
                drop(db);
                self.current = Some(role);
                info!(role = %role, "session restored");
                Ok(Some(role))
            }
            None => {
                db.delete_setting(SESSION_ROLE)?;
                db.delete_setting(SESSION_FINGERPRINT)?;
                db.log_session(None, "restore", "stale")?;
                drop(db);
                self.current = None;
                warn!("discarded stale session");
                Ok(None)
            }
        }
    }

    /// Role of the last successful login, kept across logouts to pre-fill
    /// the login form.
    pub fn last_role(&self) -> DeskResult<Option<Role>> {
        let db = self.lock()?;
        Ok(db
            .get_setting(LAST_ROLE)?
            .and_then(|raw| raw.parse::<Role>().ok()))
    }

    pub fn set_password(&self, role: Role, password: &str) -> DeskResult<()> {
        let hashed = CryptoService::hash_password(password)
            .map_err(|e| DeskError::Internal(e.to_string()))?;
        let db = self.lock()?;
        db.set_setting(&secret_key(role), &hashed)?;
        db.log_session(Some(role.as_str()), "set_password", "success")?;
        info!(role = %role, "role password updated");
        Ok(())
    }

    /// Roles that have a password set.
    pub fn configured_roles(&self) -> DeskResult<Vec<Role>> {
        let db = self.lock()?;
        Ok(db
            .get_settings_with_prefix(SECRET_PREFIX)?
            .into_iter()
            .filter_map(|(role, _)| role.parse::<Role>().ok())
            .collect())
    }

    pub fn recent_events(&self, limit: usize) -> DeskResult<Vec<SessionLogEntry>> {
        let db = self.lock()?;
        Ok(db.get_recent_session_log(limit)?)
    }

    fn lock(&self) -> DeskResult<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| DeskError::StorageLock)
    }
}

fn secret_key(role: Role) -> String {
    format!("{}{}", SECRET_PREFIX, role.as_str())
}

fn fingerprint(role: Role, stored_secret: &str) -> String {
    sha256_hex(&[role.as_str(), stored_secret])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_passwords() -> Session {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let session = Session::new(db);
        session.set_password(Role::Admin, "admin-pass").unwrap();
        session.set_password(Role::Manager, "manager-pass").unwrap();
        session
    }

    #[test]
    fn login_sets_and_persists_the_role() {
        let mut session = session_with_passwords();
        assert_eq!(session.login("manager", "manager-pass").unwrap(), Role::Manager);
        assert_eq!(session.current_role(), Some(Role::Manager));
        assert_eq!(session.last_role().unwrap(), Some(Role::Manager));

        let mut reopened = Session::new(session.db.clone());
        assert_eq!(reopened.restore_session().unwrap(), Some(Role::Manager));
    }

    #[test]
    fn failed_login_changes_nothing() {
        let mut session = session_with_passwords();
        session.login("admin", "admin-pass").unwrap();

        let err = session.login("manager", "wrong").unwrap_err();
        assert!(matches!(err, DeskError::InvalidCredentials));
        assert_eq!(session.current_role(), Some(Role::Admin));
        assert_eq!(session.last_role().unwrap(), Some(Role::Admin));
    }

    #[test]
    fn unknown_role_and_wrong_password_look_the_same() {
        let mut session = session_with_passwords();
        let unknown = session.login("owner", "admin-pass").unwrap_err();
        let wrong = session.login("admin", "nope").unwrap_err();
        let unconfigured = session.login("executor", "").unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.to_string(), unconfigured.to_string());
        assert_eq!(session.current_role(), None);
    }

    #[test]
    fn logout_is_idempotent_and_keeps_last_role() {
        let mut session = session_with_passwords();
        session.login("admin", "admin-pass").unwrap();
        session.logout().unwrap();
        session.logout().unwrap();

        assert_eq!(session.current_role(), None);
        assert_eq!(session.last_role().unwrap(), Some(Role::Admin));
        assert_eq!(session.restore_session().unwrap(), None);
    }

    #[test]
    fn changing_a_password_invalidates_persisted_sessions() {
        let mut session = session_with_passwords();
        session.login("manager", "manager-pass").unwrap();
        session.set_password(Role::Manager, "rotated").unwrap();

        let mut reopened = Session::new(session.db.clone());
        assert_eq!(reopened.restore_session().unwrap(), None);
        assert!(matches!(reopened.require_role(), Err(DeskError::NotLoggedIn)));
    }

    #[test]
    fn configured_roles_and_events_are_recorded() {
        let mut session = session_with_passwords();
        let mut roles = session.configured_roles().unwrap();
        roles.sort();
        assert_eq!(roles, vec![Role::Admin, Role::Manager]);

        session.login("admin", "wrong").unwrap_err();
        let events = session.recent_events(1).unwrap();
        assert_eq!(events[0].event, "login");
        assert_eq!(events[0].status, "failed");
        assert_eq!(events[0].role, None);
    }

    #[test]
    fn garbage_in_storage_is_not_restored() {
        let session = session_with_passwords();
        {
            let db = session.db.lock().unwrap();
            db.set_setting(SESSION_ROLE, "superuser").unwrap();
            db.set_setting(SESSION_FINGERPRINT, "abc").unwrap();
        }
        let mut reopened = Session::new(session.db.clone());
        assert_eq!(reopened.restore_session().unwrap(), None);
        let db = session.db.lock().unwrap();
        assert_eq!(db.get_setting(SESSION_ROLE).unwrap(), None);
    }
}

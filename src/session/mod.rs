//! Authenticated session state, persisted through an injected store.
//!
//! # Lifecycle
//!
//! ```text
//! Unauthenticated ──login──▶ Authenticating ──ok──▶ Authenticated
//!        ▲                        │                      │
//!        └────────── error ───────┘                      │
//!        └──────────────── logout / invalidation ────────┘
//! ```
//!
//! [`SessionStore::init`] validates what is on disk before trusting it. The
//! stored `app_version` must equal [`SCHEMA_VERSION`] and the cached profile
//! must carry an `is_admin` flag; otherwise the whole store is wiped and the
//! session starts unauthenticated.
pub mod storage;
pub mod validation;

use crate::api::ApiClient;
use crate::api::types::User;
use crate::error::{ClientError, ClientResult};
use storage::KeyValueStore;

/// Version tag of the persisted session shape. Bump to invalidate old caches.
pub const SCHEMA_VERSION: &str = "v2.0-admin";

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const VERSION_KEY: &str = "app_version";

// ---------------------------------------------------------------------------
// Auth backend seam
// ---------------------------------------------------------------------------

/// The subset of the remote API the session store depends on.
pub trait AuthBackend {
    fn login(&self, username: &str, password: &str) -> ClientResult<String>;
    fn me(&self, token: &str) -> ClientResult<User>;
    fn register(&self, username: &str, password: &str) -> ClientResult<()>;
    fn logout(&self, token: &str) -> ClientResult<()>;
}

impl AuthBackend for ApiClient {
    fn login(&self, username: &str, password: &str) -> ClientResult<String> {
        ApiClient::login(self, username, password)
    }

    fn me(&self, token: &str) -> ClientResult<User> {
        ApiClient::me(self, token)
    }

    fn register(&self, username: &str, password: &str) -> ClientResult<()> {
        ApiClient::register(self, username, password)
    }

    fn logout(&self, token: &str) -> ClientResult<()> {
        ApiClient::logout(self, token)
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated(Session),
}

/// Why [`SessionStore::init`] discarded stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    VersionMismatch,
    MissingAdminFlag,
    CorruptProfile,
}

pub struct SessionStore<S: KeyValueStore> {
    storage: S,
    state: SessionState,
    invalidated: Option<InvalidationReason>,
}

impl<S: KeyValueStore> SessionStore<S> {
    /// Read and validate stored session data, wiping it if it is stale.
    pub fn init(storage: S) -> Self {
        let mut store = Self {
            storage,
            state: SessionState::Unauthenticated,
            invalidated: None,
        };

        match store.storage.get(VERSION_KEY) {
            Some(version) if version == SCHEMA_VERSION => {}
            None if store.storage.get(TOKEN_KEY).is_none() => {
                // Untagged leftovers are wiped without reporting an invalidation.
                if let Err(e) = store.storage.clear() {
                    tracing::warn!(error = %e, "failed to clear session storage");
                }
                if let Err(e) = store.storage.set(VERSION_KEY, SCHEMA_VERSION) {
                    tracing::warn!(error = %e, "failed to write session schema version");
                }
                return store;
            }
            _ => {
                store.invalidate(InvalidationReason::VersionMismatch);
                return store;
            }
        }

        let (Some(token), Some(raw_user)) =
            (store.storage.get(TOKEN_KEY), store.storage.get(USER_KEY))
        else {
            return store;
        };

        match parse_stored_user(&raw_user) {
            Ok(user) => {
                tracing::debug!(username = %user.username, "restored session");
                store.state = SessionState::Authenticated(Session { token, user });
            }
            Err(reason) => store.invalidate(reason),
        }

        store
    }

    fn invalidate(&mut self, reason: InvalidationReason) {
        tracing::info!(?reason, "clearing stale session storage");
        if let Err(e) = self.storage.clear() {
            tracing::warn!(error = %e, "failed to clear session storage");
        }
        if let Err(e) = self.storage.set(VERSION_KEY, SCHEMA_VERSION) {
            tracing::warn!(error = %e, "failed to write session schema version");
        }
        self.state = SessionState::Unauthenticated;
        self.invalidated = Some(reason);
    }

    // -- Accessors ----------------------------------------------------------

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Set when `init` found stale data and wiped it.
    pub fn invalidated(&self) -> Option<InvalidationReason> {
        self.invalidated
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.session().map(|s| s.token.as_str())
    }

    pub fn user(&self) -> Option<&User> {
        self.session().map(|s| &s.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|u| u.is_admin)
    }

    /// Token of a logged-in user, or an authentication error.
    pub fn require_token(&self) -> ClientResult<&str> {
        self.token().ok_or_else(|| {
            ClientError::Authentication("not logged in, run `verity login` first".into())
        })
    }

    /// Token of a logged-in admin. Fails without a network call otherwise.
    pub fn require_admin(&self) -> ClientResult<&str> {
        let token = self.require_token()?;
        if !self.is_admin() {
            return Err(ClientError::Forbidden(
                "this action requires an admin account".into(),
            ));
        }
        Ok(token)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // -- Transitions --------------------------------------------------------

    /// Authenticate and persist the session.
    ///
    /// On failure the previous state is restored and storage is untouched.
    pub fn login(
        &mut self,
        api: &impl AuthBackend,
        username: &str,
        password: &str,
    ) -> ClientResult<&Session> {
        validation::validate_login(username, password)?;

        let previous = std::mem::replace(&mut self.state, SessionState::Authenticating);
        tracing::debug!(username, "authenticating");

        let result = api
            .login(username, password)
            .and_then(|token| api.me(&token).map(|user| Session { token, user }));

        let session = match result {
            Ok(session) => session,
            Err(e) => {
                self.state = previous;
                return Err(e);
            }
        };

        if let Err(e) = self.persist(&session) {
            self.state = previous;
            return Err(e);
        }

        tracing::info!(username = %session.user.username, admin = session.user.is_admin, "logged in");
        self.state = SessionState::Authenticated(session);
        self.session()
            .ok_or_else(|| ClientError::Storage("session vanished after login".into()))
    }

    fn persist(&mut self, session: &Session) -> ClientResult<()> {
        let user_json = serde_json::to_string(&session.user)?;
        self.storage.set(TOKEN_KEY, &session.token)?;
        self.storage.set(USER_KEY, &user_json)?;
        self.storage.set(VERSION_KEY, SCHEMA_VERSION)
    }

    /// Validate locally, register, then log in with the same credentials.
    pub fn register(
        &mut self,
        api: &impl AuthBackend,
        username: &str,
        password: &str,
        confirm: &str,
    ) -> ClientResult<&Session> {
        let username = validation::validate_registration(username, password, confirm)?;
        api.register(username, password)?;
        tracing::info!(username, "registered");
        self.login(api, username, password)
    }

    /// Notify the server, then clear local state whatever the outcome.
    pub fn logout(&mut self, api: &impl AuthBackend) {
        if let Some(token) = self.token() {
            if let Err(e) = api.logout(token) {
                tracing::warn!(error = %e, "logout notification failed, clearing locally");
            }
        }
        self.clear_local();
    }

    /// Drop the session locally without contacting the server.
    ///
    /// Used when the server rejects a stored token.
    pub fn clear_local(&mut self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, error = %e, "failed to remove session entry");
            }
        }
        self.state = SessionState::Unauthenticated;
    }
}

/// Parse a cached profile, insisting on the explicit `is_admin` field.
fn parse_stored_user(raw: &str) -> Result<User, InvalidationReason> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| InvalidationReason::CorruptProfile)?;
    if value.get("is_admin").and_then(|v| v.as_bool()).is_none() {
        return Err(InvalidationReason::MissingAdminFlag);
    }
    serde_json::from_value(value).map_err(|_| InvalidationReason::CorruptProfile)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::storage::MemoryStore;
    use super::*;

    struct FakeApi {
        admin: bool,
        fail_login: bool,
        fail_logout: bool,
        logout_calls: Cell<usize>,
        register_calls: Cell<usize>,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                admin: false,
                fail_login: false,
                fail_logout: false,
                logout_calls: Cell::new(0),
                register_calls: Cell::new(0),
            }
        }
    }

    impl AuthBackend for FakeApi {
        fn login(&self, username: &str, _password: &str) -> ClientResult<String> {
            if self.fail_login {
                return Err(ClientError::Authentication("Incorrect username or password".into()));
            }
            Ok(format!("token-{username}"))
        }

        fn me(&self, token: &str) -> ClientResult<User> {
            Ok(User {
                username: token.trim_start_matches("token-").to_string(),
                id: 1,
                is_admin: self.admin,
            })
        }

        fn register(&self, _username: &str, _password: &str) -> ClientResult<()> {
            self.register_calls.set(self.register_calls.get() + 1);
            Ok(())
        }

        fn logout(&self, _token: &str) -> ClientResult<()> {
            self.logout_calls.set(self.logout_calls.get() + 1);
            if self.fail_logout {
                return Err(ClientError::Network("connection refused".into()));
            }
            Ok(())
        }
    }

    fn valid_storage(user_json: &str) -> MemoryStore {
        MemoryStore::with_entries([
            (VERSION_KEY, SCHEMA_VERSION),
            (TOKEN_KEY, "tok"),
            (USER_KEY, user_json),
        ])
    }

    #[test]
    fn empty_storage_settles_unauthenticated_with_version() {
        let store = SessionStore::init(MemoryStore::new());
        assert_eq!(store.state(), &SessionState::Unauthenticated);
        assert_eq!(store.invalidated(), None);
        assert_eq!(
            store.storage().get(VERSION_KEY).as_deref(),
            Some(SCHEMA_VERSION)
        );
    }

    #[test]
    fn untagged_leftovers_are_wiped_on_first_run() {
        let storage = MemoryStore::with_entries([(USER_KEY, r#"{"username":"old","id":1}"#)]);
        let store = SessionStore::init(storage);

        assert_eq!(store.state(), &SessionState::Unauthenticated);
        assert_eq!(store.invalidated(), None);
        assert!(store.storage().get(USER_KEY).is_none());
        assert_eq!(
            store.storage().get(VERSION_KEY).as_deref(),
            Some(SCHEMA_VERSION)
        );
        assert_eq!(store.storage().len(), 1);
    }

    #[test]
    fn version_mismatch_wipes_storage() {
        let storage = MemoryStore::with_entries([
            (VERSION_KEY, "v1.0"),
            (TOKEN_KEY, "tok"),
            (USER_KEY, r#"{"username":"a","id":1,"is_admin":true}"#),
        ]);
        let store = SessionStore::init(storage);

        assert!(!store.is_authenticated());
        assert_eq!(store.invalidated(), Some(InvalidationReason::VersionMismatch));
        assert!(store.storage().get(TOKEN_KEY).is_none());
        assert!(store.storage().get(USER_KEY).is_none());
        assert_eq!(store.storage().len(), 1);
    }

    #[test]
    fn profile_without_admin_flag_wipes_storage() {
        let store = SessionStore::init(valid_storage(r#"{"username":"a","id":1}"#));
        assert!(!store.is_authenticated());
        assert_eq!(store.invalidated(), Some(InvalidationReason::MissingAdminFlag));
        assert!(store.storage().get(TOKEN_KEY).is_none());
    }

    #[test]
    fn corrupt_profile_wipes_storage() {
        let store = SessionStore::init(valid_storage("{not json"));
        assert_eq!(store.invalidated(), Some(InvalidationReason::CorruptProfile));
        assert!(store.storage().get(TOKEN_KEY).is_none());
    }

    #[test]
    fn valid_storage_restores_session() {
        let store = SessionStore::init(valid_storage(r#"{"username":"a","id":4,"is_admin":true}"#));
        assert!(store.is_authenticated());
        assert!(store.is_admin());
        assert_eq!(store.token(), Some("tok"));
        assert_eq!(store.invalidated(), None);
    }

    #[test]
    fn login_persists_token_and_profile() {
        let mut store = SessionStore::init(MemoryStore::new());
        let api = FakeApi::new();
        store.login(&api, "carol", "pw").unwrap();

        assert_eq!(store.token(), Some("token-carol"));
        assert_eq!(store.storage().get(TOKEN_KEY).as_deref(), Some("token-carol"));
        let raw = store.storage().get(USER_KEY).unwrap();
        assert!(raw.contains("\"is_admin\":false"));

        // A fresh init over the same storage restores the session.
        let restored = SessionStore::init(store.storage().clone());
        assert_eq!(restored.user().unwrap().username, "carol");
    }

    #[test]
    fn failed_login_leaves_state_and_storage_untouched() {
        let mut store = SessionStore::init(MemoryStore::new());
        let api = FakeApi {
            fail_login: true,
            ..FakeApi::new()
        };
        let err = store.login(&api, "carol", "wrong").unwrap_err();

        assert!(err.is_auth());
        assert_eq!(store.state(), &SessionState::Unauthenticated);
        assert!(store.storage().get(TOKEN_KEY).is_none());
    }

    #[test]
    fn logout_clears_even_when_server_unreachable() {
        let mut store = SessionStore::init(valid_storage(r#"{"username":"a","id":1,"is_admin":false}"#));
        let api = FakeApi {
            fail_logout: true,
            ..FakeApi::new()
        };
        store.logout(&api);

        assert_eq!(api.logout_calls.get(), 1);
        assert!(!store.is_authenticated());
        assert!(store.storage().get(TOKEN_KEY).is_none());
        assert!(store.storage().get(USER_KEY).is_none());
        assert_eq!(
            store.storage().get(VERSION_KEY).as_deref(),
            Some(SCHEMA_VERSION)
        );
    }

    #[test]
    fn logout_without_session_skips_server() {
        let mut store = SessionStore::init(MemoryStore::new());
        let api = FakeApi::new();
        store.logout(&api);
        assert_eq!(api.logout_calls.get(), 0);
    }

    #[test]
    fn register_validates_before_network() {
        let mut store = SessionStore::init(MemoryStore::new());
        let api = FakeApi::new();
        let err = store.register(&api, "dave", "secret1", "secret2").unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(api.register_calls.get(), 0);
    }

    #[test]
    fn register_logs_in_afterwards() {
        let mut store = SessionStore::init(MemoryStore::new());
        let api = FakeApi::new();
        store.register(&api, " dave ", "secret1", "secret1").unwrap();

        assert_eq!(api.register_calls.get(), 1);
        assert_eq!(store.user().unwrap().username, "dave");
    }

    #[test]
    fn require_admin_rejects_regular_users() {
        let store = SessionStore::init(valid_storage(r#"{"username":"a","id":1,"is_admin":false}"#));
        assert!(matches!(store.require_admin(), Err(ClientError::Forbidden(_))));

        let anon = SessionStore::init(MemoryStore::new());
        assert!(matches!(
            anon.require_admin(),
            Err(ClientError::Authentication(_))
        ));
    }
}

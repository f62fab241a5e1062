//! Session state: bearer token and user profile.
//!
//! The presence of a token is the authentication predicate for the whole
//! client. It decides whether API calls carry an `Authorization` header and
//! whether conversion statistics are persisted between runs.

use crate::error::D2xError;
use crate::model::{email_local_part, User};
use crate::storage::{read_json, write_json, SharedStore};
use tracing::{debug, warn};

/// Storage key of the bearer token.
pub const TOKEN_KEY: &str = "accessToken";

/// Storage key of the JSON-encoded [`User`].
pub const USER_KEY: &str = "user";

/// Handle to the persisted session. Cheap to clone; clones share storage.
#[derive(Clone)]
pub struct SessionStore {
    store: SharedStore,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl SessionStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// The underlying storage, shared with the stats store.
    pub fn storage(&self) -> &SharedStore {
        &self.store
    }

    /// Current bearer token, if signed in.
    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Profile of the signed-in user. A corrupt profile reads as absent.
    pub fn user(&self) -> Option<User> {
        match read_json::<User>(self.store.as_ref(), USER_KEY) {
            Ok(user) => user,
            Err(e) => {
                warn!("Discarding stored user profile: {}", e);
                None
            }
        }
    }

    /// Record a successful login.
    pub fn sign_in(&self, token: &str, email: &str) -> Result<(), D2xError> {
        self.store_session(
            token,
            &User {
                email: email.to_string(),
                name: None,
            },
        )
    }

    /// Record a successful registration; `name` defaults to the email's
    /// local part.
    pub fn sign_up(&self, token: &str, email: &str, name: Option<&str>) -> Result<(), D2xError> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email_local_part(email));
        self.store_session(
            token,
            &User {
                email: email.to_string(),
                name: Some(name.to_string()),
            },
        )
    }

    /// Forget the token and profile.
    pub fn clear(&self) -> Result<(), D2xError> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(USER_KEY)?;
        debug!("Session cleared");
        Ok(())
    }

    fn store_session(&self, token: &str, user: &User) -> Result<(), D2xError> {
        self.store.set(TOKEN_KEY, token)?;
        write_json(self.store.as_ref(), USER_KEY, user)?;
        debug!("Session stored for {}", user.email);
        Ok(())
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::auth::{AuthorizationSurface, Flow as AuthFlow};
use crate::data::{AccountRef, AuthService};
use crate::storage::{SessionStore, ACCOUNT_KEY, SESSION_KEY};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("not signed in")]
    NotAuthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub session_id: String,
    pub account_id: u64,
}

impl ActiveSession {
    pub fn account_ref(&self) -> AccountRef<'_> {
        AccountRef {
            account_id: self.account_id,
            session_id: &self.session_id,
        }
    }
}

pub struct Manager {
    store: Arc<dyn SessionStore>,
    flow: Arc<AuthFlow>,
    service: Arc<dyn AuthService>,
    session: RwLock<Option<String>>,
    account_id: RwLock<Option<u64>>,
    configured_account: Option<u64>,
}

impl Manager {
    /// Reads any persisted session once; later reads go through memory.
    pub fn new(
        store: Arc<dyn SessionStore>,
        flow: Arc<AuthFlow>,
        service: Arc<dyn AuthService>,
        configured_account: Option<u64>,
    ) -> Self {
        let session = store.get(SESSION_KEY).unwrap_or_else(|err| {
            warn!(error = ?err, "session: failed to read stored session");
            None
        });
        let account_id = match &session {
            Some(_) => store
                .get(ACCOUNT_KEY)
                .ok()
                .flatten()
                .and_then(|raw| raw.parse::<u64>().ok()),
            None => None,
        };
        Self {
            store,
            flow,
            service,
            session: RwLock::new(session),
            account_id: RwLock::new(account_id),
            configured_account: configured_account.filter(|id| *id != 0),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    pub fn begin_authentication(&self, surface: &mut dyn AuthorizationSurface) -> Result<String> {
        let session_id = match self.flow.authenticate(surface) {
            Ok(id) => id,
            Err(err) => {
                error!(error = ?err, "session: authentication failed");
                return Err(err);
            }
        };
        if let Err(err) = self.store.set(SESSION_KEY, &session_id) {
            warn!(error = ?err, "session: failed to persist session id");
        }
        *self.account_id.write() = None;
        *self.session.write() = Some(session_id.clone());
        info!("session: signed in");
        Ok(session_id)
    }

    pub fn clear_session(&self) {
        for key in [SESSION_KEY, ACCOUNT_KEY] {
            if let Err(err) = self.store.clear(key) {
                warn!(error = ?err, key, "session: failed to clear stored value");
            }
        }
        *self.session.write() = None;
        *self.account_id.write() = None;
        info!("session: signed out");
    }

    /// Configured account id, else the one resolved from the session.
    pub fn account_id(&self) -> Result<u64> {
        if let Some(id) = self.configured_account {
            return Ok(id);
        }
        if let Some(id) = *self.account_id.read() {
            return Ok(id);
        }
        let session_id = self.session_id().ok_or(SessionError::NotAuthenticated)?;
        let account = self
            .service
            .account(&session_id)
            .context("session: resolve account id")?;
        if let Err(err) = self.store.set(ACCOUNT_KEY, &account.id.to_string()) {
            warn!(error = ?err, "session: failed to cache account id");
        }
        *self.account_id.write() = Some(account.id);
        Ok(account.id)
    }

    /// Session plus account, or `None` when signed out.
    pub fn active(&self) -> Result<Option<ActiveSession>> {
        let Some(session_id) = self.session_id() else {
            return Ok(None);
        };
        let account_id = self.account_id()?;
        Ok(Some(ActiveSession {
            session_id,
            account_id,
        }))
    }
}

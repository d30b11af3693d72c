//! In-process identity provider for tests and local runs

use async_trait::async_trait;
use common::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::IdentityProvider;

/// Identity provider that keeps accounts in memory
///
/// Emails are compared case-insensitively, as the hosted provider does.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    /// email -> identity id
    accounts: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
    created: AtomicU32,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing account
    pub fn with_identity(self, identity_id: &str, email: &str) -> Self {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(email.to_lowercase(), identity_id.to_string());
        }
        self
    }

    /// Make every call fail as if the provider were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of accounts created through `create_account`
    pub fn created_count(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> CoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::upstream("Identity provider unavailable"));
        }
        Ok(())
    }

    fn accounts(&self) -> CoreResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.accounts
            .lock()
            .map_err(|_| CoreError::internal("Identity account table poisoned"))
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_account(&self, email: &str, password: &str) -> CoreResult<String> {
        self.check_available()?;

        if password.len() < 6 {
            return Err(CoreError::validation("Password rejected by identity provider"));
        }

        let mut accounts = self.accounts()?;
        let key = email.to_lowercase();
        if accounts.contains_key(&key) {
            return Err(CoreError::DuplicateIdentity("User already exists".to_string()));
        }

        let identity_id = Uuid::new_v4().simple().to_string();
        accounts.insert(key, identity_id.clone());
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(identity_id)
    }

    async fn identity_exists(&self, identity_id: &str) -> CoreResult<bool> {
        self.check_available()?;
        Ok(self.accounts()?.values().any(|id| id == identity_id))
    }
}

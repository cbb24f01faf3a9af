use async_trait::async_trait;
use parking_lot::RwLock;
use squeak_common::StoreError;
use std::collections::HashMap;
use subtle::ConstantTimeEq;

use super::{CredentialStore, token_fingerprint};

/// In-process credential store.
///
/// Keeps the live token per subject and an owner index from token
/// fingerprint back to subject, so revocation is a lookup rather than a
/// scan.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    by_subject: HashMap<String, String>,
    owners: HashMap<String, String>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subjects with a live refresh token.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().by_subject.len()
    }

    /// Whether no subject has a live refresh token.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().by_subject.is_empty()
    }
}

fn same_token(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn put(&self, subject: &str, token: &str) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if let Some(old) = state
            .by_subject
            .insert(subject.to_string(), token.to_string())
        {
            let old = token_fingerprint(&old);
            if state.owners.get(&old).is_some_and(|owner| owner == subject) {
                state.owners.remove(&old);
            }
        }
        state
            .owners
            .insert(token_fingerprint(token), subject.to_string());
        Ok(())
    }

    async fn is_current(&self, subject: &str, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .state
            .read()
            .by_subject
            .get(subject)
            .is_some_and(|stored| same_token(stored, token)))
    }

    async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let Some(subject) = state.owners.remove(&token_fingerprint(token)) else {
            return Ok(());
        };
        if state
            .by_subject
            .get(&subject)
            .is_some_and(|stored| same_token(stored, token))
        {
            state.by_subject.remove(&subject);
        }
        Ok(())
    }
}

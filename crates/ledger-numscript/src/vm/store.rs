//! Account data the machine reads while resolving

use std::collections::HashMap;

use async_trait::async_trait;
use ledger_types::AccountWithVolumes;

use super::error::{BoxError, MachineError};

/// Source of account snapshots (metadata and volumes).
///
/// Accounts with no history must be returned empty, not as an error.
#[async_trait]
pub trait AccountReader: Send + Sync {
    async fn get_account(&self, address: &str) -> Result<AccountWithVolumes, BoxError>;
}

/// Metadata lookups on top of an account reader
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Raw metadata value, or `MissingMetadata` when the key is absent
    async fn get_metadata(&self, account: &str, key: &str) -> Result<String, MachineError>;
}

#[async_trait]
impl<T> MetadataProvider for T
where
    T: AccountReader + ?Sized,
{
    async fn get_metadata(&self, account: &str, key: &str) -> Result<String, MachineError> {
        let mut snapshot = self
            .get_account(account)
            .await
            .map_err(MachineError::Store)?;
        snapshot
            .metadata
            .remove(key)
            .ok_or_else(|| MachineError::MissingMetadata {
                account: account.to_string(),
                key: key.to_string(),
            })
    }
}

/// Fixed set of accounts, mostly useful for tests and dry evaluation
#[async_trait]
impl AccountReader for HashMap<String, AccountWithVolumes> {
    async fn get_account(&self, address: &str) -> Result<AccountWithVolumes, BoxError> {
        Ok(self
            .get(address)
            .cloned()
            .unwrap_or_else(|| AccountWithVolumes::empty(address)))
    }
}

use crate::domain::error::{AppError, Result};
use keyring::Entry;

/// The Azure DevOps personal access token in the OS credential store.
pub struct PatStore {
    service: String,
    account: String,
}

impl PatStore {
    pub fn new(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
        }
    }

    /// `Ok(None)` when nothing has been stored yet.
    pub fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(pat) => Ok(Some(pat)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::SecurityError(format!(
                "Failed to read token from {}: {e}",
                self.service
            ))),
        }
    }

    pub fn save(&self, pat: &str) -> Result<()> {
        self.entry()?
            .set_password(pat)
            .map_err(|e| AppError::SecurityError(format!("Failed to store token: {e}")))
    }

    /// Removing a token that was never stored is not an error.
    pub fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::SecurityError(format!("Failed to remove token: {e}"))),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.account).map_err(|e| {
            AppError::SecurityError(format!("Failed to open credential entry: {e}"))
        })
    }
}

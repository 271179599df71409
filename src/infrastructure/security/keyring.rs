use crate::domain::error::{AppError, Result};
use keyring::Entry;

/// Read access to secrets kept in the OS keychain.
pub struct KeyringManager {
    service: String,
}

impl KeyringManager {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    pub fn get_secret(&self, key: &str) -> Result<String> {
        let entry = Entry::new(&self.service, key)
            .map_err(|e| AppError::SecurityError(format!("Failed to open keychain entry: {}", e)))?;

        entry
            .get_password()
            .map_err(|e| AppError::SecurityError(format!("Failed to read secret '{}': {}", key, e)))
    }
}

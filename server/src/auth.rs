//! Resolution of a connection's credential to a driver identity

use parking_lot::RwLock;
use shared::DriverId;
use std::collections::HashMap;

pub trait Authenticator: Send + Sync {
    /// Returns the identity behind `credential`, or None if it is not valid.
    fn authenticate(&self, credential: &str) -> Option<DriverId>;
}

/// Fixed table of bearer tokens, one per driver
#[derive(Debug, Default)]
pub struct StaticTokens {
    tokens: RwLock<HashMap<String, DriverId>>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, token: impl Into<String>, driver_id: DriverId) {
        self.tokens.write().insert(token.into(), driver_id);
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.write().remove(token).is_some()
    }

    /// Copy of every (token, driver) pair
    pub fn entries(&self) -> Vec<(String, DriverId)> {
        self.tokens
            .read()
            .iter()
            .map(|(token, id)| (token.clone(), *id))
            .collect()
    }

    /// Parses `token=uuid` lines;blank lines and `#` comments are skipped.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let tokens = Self::new();

        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (token, id) = line
                .split_once('=')
                .ok_or_else(|| format!("line {}: expected token=driver-id", number + 1))?;
            let driver_id = id
                .trim()
                .parse::<DriverId>()
                .map_err(|e| format!("line {}: {}", number + 1, e))?;

            tokens.issue(token.trim(), driver_id);
        }

        Ok(tokens)
    }
}

impl Authenticator for StaticTokens {
    fn authenticate(&self, credential: &str) -> Option<DriverId> {
        self.tokens.read().get(credential.trim()).copied()
    }
}

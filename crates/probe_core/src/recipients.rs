//! Recipient resolution: who scripted replies go to.

use crate::error::{ProbeError, Result};
use crate::types::{address_number, Address};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

/// Tracks configured recipients and the addresses that actually replied.
///
/// `active` only grows. It survives across runs for the lifetime of the
/// process, because the remote party may answer from a different address
/// suffix than the one configured (`@lid` vs `@c.us`).
#[derive(Debug)]
pub struct RecipientRegistry {
    configured: Vec<Address>,
    targets: HashSet<String>,
    active: Mutex<Vec<Address>>,
}

impl RecipientRegistry {
    /// Creates a registry from the configured recipient list.
    ///
    /// Blank entries are dropped; an empty result is a configuration error.
    pub fn new<I, S>(configured: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<Address> = Vec::new();
        for address in configured {
            let address = address.as_ref().trim();
            if !address.is_empty() && !list.iter().any(|a| a == address) {
                list.push(address.to_string());
            }
        }
        if list.is_empty() {
            return Err(ProbeError::ConfigError(
                "at least one recipient address is required".into(),
            ));
        }

        let targets = list
            .iter()
            .map(|a| address_number(a).to_string())
            .collect();

        Ok(Self {
            configured: list,
            targets,
            active: Mutex::new(Vec::new()),
        })
    }

    /// The statically configured recipients, in configuration order.
    pub fn configured(&self) -> &[Address] {
        &self.configured
    }

    /// Whether `address` belongs to one of the configured target numbers.
    pub fn is_target(&self, address: &str) -> bool {
        self.targets.contains(address_number(address))
    }

    /// Addresses observed replying, in first-seen order.
    pub fn active(&self) -> Vec<Address> {
        self.active.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Records `address` as an active replier. Idempotent.
    pub fn record_active(&self, address: &str) {
        if let Ok(mut active) = self.active.lock() {
            if !active.iter().any(|a| a == address) {
                debug!(address, "recording active recipient");
                active.push(address.to_string());
            }
        }
    }

    /// Where replies go: the active set if anyone replied, else the configuration.
    pub fn resolve(&self) -> Vec<Address> {
        let active = self.active();
        if active.is_empty() {
            self.configured.clone()
        } else {
            active
        }
    }

    /// The first resolved recipient. Never fails, since `configured` is non-empty.
    pub fn primary(&self) -> Address {
        self.resolve()
            .into_iter()
            .next()
            .unwrap_or_else(|| self.configured[0].clone())
    }
}

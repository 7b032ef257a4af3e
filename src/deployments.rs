//! Deployed contract addresses.
//!
//! Deployment tooling prints lines like `Counter deployed at: 0x5FbD...`.
//! [`Deployments::scrape`] collects them into a name-to-address map that is
//! stored as JSON next to the chain it belongs to:
//!
//! ```json
//! {
//!   "chainId": 6342,
//!   "chainName": "MegaETH Testnet",
//!   "contracts": { "counter": "0x5fbdb2315678afecb367f032d93f642f64180aa3" }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use alloy::primitives::Address;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default chain id.
pub const DEFAULT_CHAIN_ID: u64 = 6342;

/// Default chain name.
pub const DEFAULT_CHAIN_NAME: &str = "MegaETH Testnet";

/// Matches one deployment line.
const DEPLOYMENT_PATTERN: &str = r"(\w+) deployed at: (0x[0-9a-fA-F]{40})";

// ============================================================================
// Deployments
// ============================================================================

/// Contract addresses for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployments {
    /// Chain id the contracts live on.
    pub chain_id: u64,
    /// Human-readable chain name.
    pub chain_name: String,
    /// Lowercased contract name to address.
    pub contracts: BTreeMap<String, Address>,
}

impl Default for Deployments {
    fn default() -> Self {
        Self::new(DEFAULT_CHAIN_ID, DEFAULT_CHAIN_NAME)
    }
}

impl Deployments {
    /// Creates an empty set for the given chain.
    #[must_use]
    pub fn new(chain_id: u64, chain_name: impl Into<String>) -> Self {
        Self {
            chain_id,
            chain_name: chain_name.into(),
            contracts: BTreeMap::new(),
        }
    }

    /// Extracts every `<Name> deployed at: <address>` line from `log`.
    ///
    /// Names are lowercased; a later line wins over an earlier one with the
    /// same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the line pattern fails to compile.
    pub fn scrape(log: &str, chain_id: u64, chain_name: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(DEPLOYMENT_PATTERN).map_err(|e| Error::config(e.to_string()))?;
        let mut deployments = Self::new(chain_id, chain_name);

        for captures in pattern.captures_iter(log) {
            let name = captures[1].to_lowercase();
            let Ok(address) = captures[2].parse::<Address>() else {
                continue;
            };

            trace!(%name, %address, "Found deployment");
            deployments.contracts.insert(name, address);
        }

        debug!(count = deployments.len(), "Scraped deployment log");
        Ok(deployments)
    }

    /// Returns the address recorded for `name`, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Address> {
        self.contracts.get(&name.to_lowercase()).copied()
    }

    /// Returns the number of recorded contracts.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Returns `true` if no contracts are recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Renders as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on serialization failure.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses the JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `json` is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads the JSON form from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Writes the JSON form to `path`, with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Json`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut json = self.to_json()?;
        json.push('\n');
        fs::write(path, json)?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Supported model identifiers.
//!
//! The set is closed: an agent can only be provisioned or discovered for one
//! of these models. Each model carries three spellings:
//! - the public name used in requests and configuration (`gpt-4o`)
//! - the environment key used in `AZURE_AI_AGENT_<KEY>_<N>` (`GPT4O`)
//! - the route prefix used in `/bing-grounding/<prefix>_<N>` (`gpt4o`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

/// A model that grounding agents can be deployed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SupportedModel {
    /// GPT-4o
    Gpt4o,
    /// GPT-4o mini
    Gpt4oMini,
    /// GPT-4 Turbo
    Gpt4Turbo,
    /// GPT-4
    Gpt4,
    /// GPT-3.5 Turbo
    Gpt35Turbo,
    /// GPT-5
    Gpt5,
}

impl SupportedModel {
    /// All supported models, in declaration order
    pub const ALL: [Self; 6] = [
        Self::Gpt4o,
        Self::Gpt4oMini,
        Self::Gpt4Turbo,
        Self::Gpt4,
        Self::Gpt35Turbo,
        Self::Gpt5,
    ];

    /// Public model name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
            Self::Gpt4Turbo => "gpt-4-turbo",
            Self::Gpt4 => "gpt-4",
            Self::Gpt35Turbo => "gpt-35-turbo",
            Self::Gpt5 => "gpt-5",
        }
    }

    /// Key used in environment variable names
    #[must_use]
    pub fn env_key(&self) -> &'static str {
        match self {
            Self::Gpt4o => "GPT4O",
            Self::Gpt4oMini => "GPT4O_MINI",
            Self::Gpt4Turbo => "GPT4_TURBO",
            Self::Gpt4 => "GPT4",
            Self::Gpt35Turbo => "GPT35_TURBO",
            Self::Gpt5 => "GPT5",
        }
    }

    /// Look up a model by its environment key
    #[must_use]
    pub fn from_env_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.env_key() == key)
    }

    /// Prefix for agent routes: the public name without `-` and `.`
    #[must_use]
    pub fn route_prefix(&self) -> String {
        self.as_str().replace(['-', '.'], "")
    }

    /// Route name for the agent with the given 1-based index
    #[must_use]
    pub fn route(&self, index: u32) -> String {
        format!("{}_{index}", self.route_prefix())
    }

    /// Remote agent name used when provisioning
    #[must_use]
    pub fn agent_name(&self, index: u32) -> String {
        format!("agent_bing_{}_{index}", self.env_key().to_lowercase())
    }
}

impl fmt::Display for SupportedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupportedModel {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                GatewayError::configuration(format!(
                    "Unsupported model '{s}'. Supported: {}",
                    Self::ALL.map(|m| m.as_str()).join(", ")
                ))
            })
    }
}

impl TryFrom<String> for SupportedModel {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SupportedModel> for String {
    fn from(model: SupportedModel) -> Self {
        model.as_str().to_string()
    }
}

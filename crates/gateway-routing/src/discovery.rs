//! Agent discovery from environment variables.
//!
//! Agents provisioned ahead of time are announced to the process as
//! `AZURE_AI_AGENT_<MODEL_KEY>_<INDEX>=<remote id>`, for example
//! `AZURE_AI_AGENT_GPT4O_1=asst_abc`.

use gateway_core::{AgentHandle, SupportedModel};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

#[allow(clippy::expect_used)]
static AGENT_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^AZURE_AI_AGENT_([A-Z0-9_]+)_(\d+)$").expect("agent variable pattern is valid")
});

/// Collect agent handles from `(name, value)` pairs.
///
/// Empty values and unknown model keys are skipped. Handles come back
/// grouped in model order and sorted by index.
pub fn discover_from_env<I, K, V>(vars: I) -> Vec<AgentHandle>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut handles = Vec::new();

    for (key, value) in vars {
        let key = key.as_ref();
        let value = value.as_ref().trim();

        let Some(captures) = AGENT_VAR.captures(key) else {
            continue;
        };
        if value.is_empty() {
            debug!(var = %key, "Skipping empty agent variable");
            continue;
        }

        let model_key = &captures[1];
        let Some(model) = SupportedModel::from_env_key(model_key) else {
            warn!(var = %key, model_key = %model_key, "Skipping agent for unsupported model");
            continue;
        };
        let Ok(index) = captures[2].parse::<u32>() else {
            warn!(var = %key, "Skipping agent with out-of-range index");
            continue;
        };

        handles.push(AgentHandle::new(model, index, value));
    }

    handles.sort_by(|a, b| (a.model, a.index).cmp(&(b.model, b.index)));
    handles
}

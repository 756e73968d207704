//! Agent pool.
//!
//! Handles are grouped by model and the pool is read-only once built.
//! Selection within a group is round-robin, which keeps per-handle load
//! within one request of even across any number of calls.

use gateway_core::{
    AgentDirectory, AgentHandle, AgentSpec, GatewayError, GatewayResult, RemoteAgent,
    SupportedModel,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Handles for one model with a rotating cursor
#[derive(Debug, Default)]
struct ModelGroup {
    handles: Vec<AgentHandle>,
    cursor: AtomicUsize,
}

impl ModelGroup {
    fn next(&self) -> Option<&AgentHandle> {
        if self.handles.is_empty() {
            return None;
        }
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.handles.len();
        self.handles.get(slot)
    }
}

/// Result of a selection that may have fallen back to the default model
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    /// Chosen handle
    pub handle: &'a AgentHandle,
    /// Whether the requested model was replaced by the default model
    pub substituted: bool,
}

/// Registry of agent handles grouped by model
#[derive(Debug, Default)]
pub struct AgentPool {
    groups: BTreeMap<SupportedModel, ModelGroup>,
}

impl AgentPool {
    /// Build a pool from explicit handles.
    ///
    /// # Errors
    /// Returns a configuration error if two handles share a route or a handle
    /// has an empty remote id.
    pub fn from_handles(handles: impl IntoIterator<Item = AgentHandle>) -> GatewayResult<Self> {
        let mut seen = HashSet::new();
        let mut grouped: BTreeMap<SupportedModel, Vec<AgentHandle>> = BTreeMap::new();

        for handle in handles {
            if handle.remote_id.trim().is_empty() {
                return Err(GatewayError::configuration(format!(
                    "Agent '{}' has an empty remote id",
                    handle.route
                )));
            }
            if !seen.insert(handle.route.clone()) {
                return Err(GatewayError::configuration(format!(
                    "Duplicate agent route '{}'",
                    handle.route
                )));
            }
            grouped.entry(handle.model).or_default().push(handle);
        }

        let groups = grouped
            .into_iter()
            .map(|(model, mut handles)| {
                handles.sort_by_key(|h| h.index);
                (
                    model,
                    ModelGroup {
                        handles,
                        cursor: AtomicUsize::new(0),
                    },
                )
            })
            .collect();

        Ok(Self { groups })
    }

    /// Build the pool by discovering or provisioning remote agents.
    ///
    /// For each model with a positive desired count, agents named
    /// `agent_bing_<key>_<n>` for `n` in `1..=count` are reused when they
    /// already exist remotely and created otherwise.
    ///
    /// # Errors
    /// - Configuration error if a model name is not supported
    /// - Provisioning error if listing or creating agents fails
    pub async fn initialize(
        desired_counts: &BTreeMap<String, u32>,
        directory: &dyn AgentDirectory,
        instructions: &str,
    ) -> GatewayResult<Self> {
        // Validate every name before touching the remote service.
        let mut wanted = Vec::with_capacity(desired_counts.len());
        for (name, &count) in desired_counts {
            let model: SupportedModel = name.parse()?;
            if count > 0 {
                wanted.push((model, count));
            }
        }

        if wanted.is_empty() {
            warn!("No agents requested; pool is empty");
            return Ok(Self::default());
        }

        let existing: HashMap<String, RemoteAgent> = directory
            .list_agents()
            .await?
            .into_iter()
            .filter_map(|agent| agent.name.clone().map(|name| (name, agent)))
            .collect();

        debug!(existing = existing.len(), "Listed remote agents");

        let mut handles = Vec::new();
        for (model, count) in wanted {
            for index in 1..=count {
                let spec = AgentSpec::for_index(model, index, instructions);
                let remote_id = if let Some(agent) = existing.get(&spec.name) {
                    debug!(name = %spec.name, id = %agent.id, "Reusing remote agent");
                    agent.id.clone()
                } else {
                    let created = directory.create_agent(&spec).await?;
                    info!(name = %spec.name, id = %created.id, model = %model, "Created remote agent");
                    created.id
                };
                handles.push(AgentHandle::new(model, index, remote_id));
            }
        }

        let pool = Self::from_handles(handles)?;
        info!(agents = pool.len(), "Agent pool initialized");
        Ok(pool)
    }

    /// Pick the next handle for a model.
    ///
    /// # Errors
    /// Returns `NoAgentAvailable` if the model's group is empty.
    pub fn select_handle(&self, model: SupportedModel) -> GatewayResult<&AgentHandle> {
        self.groups
            .get(&model)
            .and_then(ModelGroup::next)
            .ok_or_else(|| GatewayError::no_agent(model.as_str()))
    }

    /// Pick a handle for a requested model name, substituting the default
    /// model when the requested one is unknown or has no agents.
    ///
    /// # Errors
    /// Returns `NoAgentAvailable` only if the default model is empty as well.
    pub fn select_or_default(
        &self,
        requested: &str,
        default: SupportedModel,
    ) -> GatewayResult<Selection<'_>> {
        let parsed = requested.parse::<SupportedModel>().ok();

        if let Some(handle) = parsed.and_then(|model| self.select_handle(model).ok()) {
            return Ok(Selection {
                handle,
                substituted: false,
            });
        }

        debug!(requested = %requested, default = %default, "Substituting default model");
        let handle = self.select_handle(default)?;
        Ok(Selection {
            handle,
            substituted: parsed != Some(handle.model),
        })
    }

    /// Look up a handle by route
    #[must_use]
    pub fn find_by_route(&self, route: &str) -> Option<&AgentHandle> {
        self.handles().find(|h| h.route == route)
    }

    /// All handles, grouped by model and ordered by index
    pub fn handles(&self) -> impl Iterator<Item = &AgentHandle> {
        self.groups.values().flat_map(|g| g.handles.iter())
    }

    /// All routes in pool order
    #[must_use]
    pub fn list_routes(&self) -> Vec<String> {
        self.handles().map(|h| h.route.clone()).collect()
    }

    /// Number of handles for a model
    #[must_use]
    pub fn group_size(&self, model: SupportedModel) -> usize {
        self.groups.get(&model).map_or(0, |g| g.handles.len())
    }

    /// Total number of handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(|g| g.handles.len()).sum()
    }

    /// Whether the pool has no handles
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

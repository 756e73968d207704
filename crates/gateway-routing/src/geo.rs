//! Region hint to backend mapping.

use std::collections::HashMap;

use crate::backend::BackendSet;

/// Maps client region hints to preferred backend ids
#[derive(Debug, Clone, Default)]
pub struct GeoPreferences {
    by_region: HashMap<String, String>,
}

impl GeoPreferences {
    /// Build from backend regions plus explicit overrides.
    ///
    /// Every backend with a region claims that region; explicit entries
    /// (region → backend id) take precedence. Regions compare case-insensitively.
    #[must_use]
    pub fn new(backends: &BackendSet, overrides: &HashMap<String, String>) -> Self {
        let mut by_region = HashMap::new();
        for backend in backends.iter() {
            if let Some(region) = &backend.region {
                by_region
                    .entry(region.to_ascii_lowercase())
                    .or_insert_with(|| backend.id.clone());
            }
        }
        for (region, backend_id) in overrides {
            by_region.insert(region.to_ascii_lowercase(), backend_id.clone());
        }
        Self { by_region }
    }

    /// Preferred backend for a region hint
    #[must_use]
    pub fn preferred(&self, region_hint: &str) -> Option<&str> {
        self.by_region
            .get(&region_hint.trim().to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether any mapping exists
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_region.is_empty()
    }
}

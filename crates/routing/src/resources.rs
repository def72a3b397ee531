use std::collections::BTreeMap;

use {
    sheetbot_common::ResourceId,
    sheetbot_config::ResourcesConfig,
};

/// Short keys ("2".."5") mapped to backend resource ids. Immutable after load.
///
/// Resolution policy:
/// - empty registry: single-tenant, calls carry no resource id;
/// - otherwise the user's selection, else the configured default key;
/// - otherwise the user must pick a resource first.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    entries: BTreeMap<String, ResourceId>,
    default_key: Option<String>,
}

/// No resource could be resolved for a multi-tenant call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no resource selected")]
pub struct SelectionRequired;

impl ResourceRegistry {
    pub fn new(
        entries: impl IntoIterator<Item = (String, ResourceId)>,
        default_key: Option<String>,
    ) -> Self {
        let entries: BTreeMap<String, ResourceId> = entries
            .into_iter()
            .map(|(key, id)| (normalize_key(&key), id))
            .collect();
        let default_key = default_key
            .map(|k| normalize_key(&k))
            .filter(|k| entries.contains_key(k));
        Self {
            entries,
            default_key,
        }
    }

    pub fn from_config(config: &ResourcesConfig) -> Self {
        Self::new(
            config
                .entries
                .iter()
                .map(|(key, id)| (key.clone(), ResourceId::new(id.trim()))),
            config.default_key.clone(),
        )
    }

    pub fn lookup(&self, key: &str) -> Option<&ResourceId> {
        self.entries.get(&normalize_key(key))
    }

    /// Key a resource id is registered under, for display.
    pub fn key_for(&self, resource: &ResourceId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, id)| *id == resource)
            .map(|(key, _)| key.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resource a backend call should target. `Ok(None)` means single-tenant.
    pub fn resolve(
        &self,
        selected: Option<&ResourceId>,
    ) -> Result<Option<ResourceId>, SelectionRequired> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        if let Some(selected) = selected {
            return Ok(Some(selected.clone()));
        }
        self.default_key
            .as_ref()
            .and_then(|key| self.entries.get(key))
            .cloned()
            .map(Some)
            .ok_or(SelectionRequired)
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

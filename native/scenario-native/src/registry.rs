//! Scenario registry: where compiled schemas are published and fetched.
//!
//! The registry owns `buildNumber`. Publishing under an existing
//! `key + version` bumps it; a new key or version starts at 1.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

use crate::ir::Schema;
use crate::validate::is_valid_version;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Version '{0}' is not of the form major.minor.patch")]
    InvalidVersion(String),

    #[error("Schema key must not be empty")]
    EmptyKey,
}

#[async_trait]
pub trait ScenarioRepository: Send + Sync {
    /// Stores `schema` and returns it with its assigned build number.
    async fn publish(&self, schema: Schema) -> Result<Schema, RegistryError>;

    /// The newest build of `key` at exactly `version`.
    async fn get(&self, key: &str, version: &str) -> Option<Schema>;

    /// The newest build of the highest version of `key`.
    async fn latest(&self, key: &str) -> Option<Schema>;
}

type SemVer = (u64, u64, u64);

fn parse_version(version: &str) -> Result<SemVer, RegistryError> {
    if !is_valid_version(version) {
        return Err(RegistryError::InvalidVersion(version.to_string()));
    }
    let mut parts = version.split('.').map(|p| p.parse::<u64>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch))) => Ok((major, minor, patch)),
        _ => Err(RegistryError::InvalidVersion(version.to_string())),
    }
}

/// Process-local repository, keyed by schema key then semantic version.
#[derive(Debug, Default)]
pub struct InMemoryScenarioRepository {
    schemas: RwLock<BTreeMap<String, BTreeMap<SemVer, Schema>>>,
}

impl InMemoryScenarioRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScenarioRepository for InMemoryScenarioRepository {
    async fn publish(&self, mut schema: Schema) -> Result<Schema, RegistryError> {
        if schema.key.is_empty() {
            return Err(RegistryError::EmptyKey);
        }
        let version = parse_version(&schema.version)?;

        let mut schemas = self.schemas.write();
        let versions = schemas.entry(schema.key.clone()).or_default();
        let build_number = versions
            .get(&version)
            .and_then(|existing| existing.build_number)
            .map_or(1, |n| n + 1);
        schema.build_number = Some(build_number);
        versions.insert(version, schema.clone());

        info!(key = %schema.key, version = %schema.version, build_number, "scenario published");
        Ok(schema)
    }

    async fn get(&self, key: &str, version: &str) -> Option<Schema> {
        let version = parse_version(version).ok()?;
        self.schemas.read().get(key)?.get(&version).cloned()
    }

    async fn latest(&self, key: &str) -> Option<Schema> {
        self.schemas
            .read()
            .get(key)?
            .last_key_value()
            .map(|(_, schema)| schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::UiNode;

    fn schema(key: &str, version: &str) -> Schema {
        Schema {
            key: key.to_string(),
            version: version.to_string(),
            build_number: None,
            main: UiNode::new("View"),
            components: BTreeMap::new(),
            stores: None,
            actions: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_build_numbers_per_key_and_version() {
        let repo = InMemoryScenarioRepository::new();
        assert_eq!(repo.publish(schema("home", "1.0.0")).await.unwrap().build_number, Some(1));
        assert_eq!(repo.publish(schema("home", "1.0.0")).await.unwrap().build_number, Some(2));
        assert_eq!(repo.publish(schema("home", "1.1.0")).await.unwrap().build_number, Some(1));
        assert_eq!(repo.publish(schema("cart", "1.0.0")).await.unwrap().build_number, Some(1));

        let fetched = repo.get("home", "1.0.0").await.unwrap();
        assert_eq!(fetched.build_number, Some(2));
    }

    #[tokio::test]
    async fn test_latest_uses_semantic_order() {
        let repo = InMemoryScenarioRepository::new();
        repo.publish(schema("home", "1.10.0")).await.unwrap();
        repo.publish(schema("home", "1.9.3")).await.unwrap();
        assert_eq!(repo.latest("home").await.unwrap().version, "1.10.0");
        assert!(repo.latest("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_invalid_version() {
        let repo = InMemoryScenarioRepository::new();
        assert_eq!(
            repo.publish(schema("home", "v1")).await.unwrap_err(),
            RegistryError::InvalidVersion("v1".to_string())
        );
    }
}

//! Dependency resolution against the published corpus
//!
//! Each parsed dependency is looked up in its ecosystem's chunk set.
//! Packages outside the analyzed corpus fall back to registry metadata.

use crate::error::{PkgriskError, Result};
use crate::models::PackageRecord;
use crate::storage::{ChunkReader, CoalescingCache, LookupOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Concurrent lookups per resolve batch
const MAX_CONCURRENT_LOOKUPS: usize = 16;

/// A dependency as produced by a manifest parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDependency {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub is_dev: bool,
    pub ecosystem: String,
}

/// Minimal metadata for packages that were never analyzed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMetadata {
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
}

/// Transport for registry metadata
pub trait RegistrySource: Send + Sync {
    /// `Ok(None)` when the registry does not know the package
    fn fetch(&self, ecosystem: &str, name: &str) -> std::io::Result<Option<RegistryMetadata>>;
}

/// Registry snapshot loaded from a JSON file: `{ecosystem: {name: metadata}}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticRegistry {
    entries: BTreeMap<String, BTreeMap<String, RegistryMetadata>>,
}

impl StaticRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PkgriskError::io(e, format!("Failed to read registry file: {:?}", path))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| PkgriskError::json(e, format!("Failed to parse registry file: {:?}", path)))
    }

    pub fn insert(&mut self, ecosystem: &str, name: &str, metadata: RegistryMetadata) {
        self.entries
            .entry(ecosystem.to_string())
            .or_default()
            .insert(name.to_string(), metadata);
    }
}

impl RegistrySource for StaticRegistry {
    fn fetch(&self, ecosystem: &str, name: &str) -> std::io::Result<Option<RegistryMetadata>> {
        Ok(self
            .entries
            .get(ecosystem)
            .and_then(|packages| packages.get(name))
            .cloned())
    }
}

/// Coalescing cache in front of a registry source
pub struct RegistryCache {
    source: Arc<dyn RegistrySource>,
    cache: CoalescingCache<Option<RegistryMetadata>>,
}

impl RegistryCache {
    pub fn new(source: Arc<dyn RegistrySource>) -> Self {
        Self {
            source,
            cache: CoalescingCache::new("registry"),
        }
    }

    pub async fn metadata(&self, ecosystem: &str, name: &str) -> Result<Arc<Option<RegistryMetadata>>> {
        let key = format!("{}/{}", ecosystem, name);
        let source = self.source.clone();
        let (ecosystem, name) = (ecosystem.to_string(), name.to_string());

        self.cache
            .get_or_try_load(&key, || async move {
                let label = format!("{}/{}", ecosystem, name);
                tokio::task::spawn_blocking(move || source.fetch(&ecosystem, &name))
                    .await
                    .unwrap_or_else(|e| Err(std::io::Error::new(std::io::ErrorKind::Other, e)))
                    .map_err(|e| {
                        PkgriskError::io(e, format!("Failed to fetch registry metadata for {}", label))
                    })
            })
            .await
    }

    pub async fn clear(&self) {
        self.cache.clear().await;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Analyzed { record: Box<PackageRecord> },
    Unanalyzed { metadata: Option<RegistryMetadata> },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDependency {
    pub dependency: ParsedDependency,
    pub resolution: Resolution,
}

pub struct DependencyResolver {
    reader: Arc<ChunkReader>,
    registry: Option<RegistryCache>,
}

impl DependencyResolver {
    pub fn new(reader: Arc<ChunkReader>, registry: Option<RegistryCache>) -> Self {
        Self { reader, registry }
    }

    /// Resolve one dependency; lookup failures become `Unavailable` for that entry only
    pub async fn resolve(&self, dependency: &ParsedDependency) -> ResolvedDependency {
        let ecosystem = dependency.ecosystem.to_ascii_lowercase();
        let resolution = match self.lookup(&ecosystem, &dependency.name).await {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::warn!(
                    "Could not resolve {}/{}: {}",
                    ecosystem,
                    dependency.name,
                    e
                );
                Resolution::Unavailable {
                    reason: e.to_string(),
                }
            }
        };

        ResolvedDependency {
            dependency: dependency.clone(),
            resolution,
        }
    }

    async fn lookup(&self, ecosystem: &str, name: &str) -> Result<Resolution> {
        Ok(match self.reader.lookup(ecosystem, name).await? {
            LookupOutcome::Found(record) => Resolution::Analyzed { record },
            LookupOutcome::Unavailable { reason } => Resolution::Unavailable { reason },
            LookupOutcome::NotFound => self.fallback(ecosystem, name).await?,
        })
    }

    async fn fallback(&self, ecosystem: &str, name: &str) -> Result<Resolution> {
        let Some(registry) = &self.registry else {
            return Ok(Resolution::Unanalyzed { metadata: None });
        };
        match registry.metadata(ecosystem, name).await {
            Ok(metadata) => Ok(Resolution::Unanalyzed {
                metadata: (*metadata).clone(),
            }),
            Err(PkgriskError::Io { source, context }) => Ok(Resolution::Unavailable {
                reason: format!("{}: {}", context, source),
            }),
            Err(e) => Err(e),
        }
    }

    /// Resolve a batch concurrently, preserving input order
    pub async fn resolve_all(
        self: &Arc<Self>,
        dependencies: Vec<ParsedDependency>,
    ) -> Result<Vec<ResolvedDependency>> {
        let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_LOOKUPS));
        let mut tasks = JoinSet::new();

        for (idx, dependency) in dependencies.into_iter().enumerate() {
            let resolver = Arc::clone(self);
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| anyhow::anyhow!("Lookup semaphore closed: {}", e))?;
                Ok::<_, PkgriskError>((idx, resolver.resolve(&dependency).await))
            });
        }

        let mut resolved = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| anyhow::anyhow!("Resolve task failed: {}", e))?;
            resolved.push(result?);
        }
        resolved.sort_by_key(|(idx, _)| *idx);
        Ok(resolved.into_iter().map(|(_, r)| r).collect())
    }
}

//! Scripted scan manifests.
//!
//! A manifest is a JSON description of a scan: the source label, the chunk
//! size, and the per-chunk responses the backend would have returned. The
//! planner and executor built from it let the full session pipeline run
//! without a live backend, which is how dry runs and demos work.

use async_trait::async_trait;
use granary_protocol::{
    ChunkExecutor, ChunkOutcome, ChunkPlan, ChunkPlanner, ChunkStats, ClearError, ExecutionError,
    ItemError, PlanningError, SourceLocation, StoreMaintenance,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub source: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default)]
    pub reset_store: bool,
    pub chunks: Vec<ManifestChunk>,
}

fn default_chunk_size() -> u32 {
    granary_protocol::defaults::DEFAULT_CHUNK_SIZE
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestChunk {
    #[serde(default)]
    pub imported: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub errors: u64,
    /// When set, the whole chunk call fails with this message.
    #[serde(default)]
    pub fail: Option<String>,
    #[serde(default)]
    pub error_details: Vec<ManifestError>,
    #[serde(default)]
    pub regions: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestError {
    pub message: String,
    #[serde(default)]
    pub source_item: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl Manifest {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&raw)?;
        Ok(manifest)
    }

    pub fn source(&self) -> SourceLocation {
        SourceLocation::from(self.source.as_str())
    }
}

impl ManifestChunk {
    fn processed(&self) -> u64 {
        self.imported + self.skipped + self.errors
    }

    fn outcome(&self) -> ChunkOutcome {
        ChunkOutcome {
            stats: ChunkStats {
                imported: self.imported,
                skipped: self.skipped,
                errors: self.errors,
                processed: self.processed(),
            },
            errors: self
                .error_details
                .iter()
                .map(|e| {
                    let mut item = ItemError::new(&e.message);
                    if let Some(source_item) = &e.source_item {
                        item = item.with_source_item(source_item);
                    }
                    if let Some(region) = &e.region {
                        item = item.with_region(region);
                    }
                    item
                })
                .collect(),
            per_region_counts: self.regions.clone(),
        }
    }
}

/// Planner that sizes the scan from the manifest itself. The chunk count is
/// taken from the manifest directly, so partial trailing chunks line up.
pub struct ManifestPlanner {
    manifest: Manifest,
}

impl ManifestPlanner {
    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }
}

#[async_trait]
impl ChunkPlanner for ManifestPlanner {
    async fn plan_scan(&self, source: &SourceLocation) -> Result<ChunkPlan, PlanningError> {
        if self.manifest.chunk_size == 0 {
            return Err(PlanningError::InvalidPlan(
                "chunk_size must be positive".to_string(),
            ));
        }
        let total_items: u64 = self.manifest.chunks.iter().map(|c| c.processed()).sum();
        let mut per_region_counts: BTreeMap<String, u64> = BTreeMap::new();
        for chunk in &self.manifest.chunks {
            for (region, count) in &chunk.regions {
                *per_region_counts.entry(region.clone()).or_insert(0) += count;
            }
        }
        info!(%source, total_items, chunks = self.manifest.chunks.len(), "Planned from manifest");
        Ok(ChunkPlan {
            total_items,
            chunk_size: self.manifest.chunk_size,
            total_chunks: self.manifest.chunks.len() as u64,
            per_region_counts,
            estimated_duration_ms: 0,
        })
    }
}

/// Executor that replays the manifest's chunk entries by index.
pub struct ManifestExecutor {
    chunks: Vec<ManifestChunk>,
}

impl ManifestExecutor {
    pub fn new(manifest: &Manifest) -> Self {
        Self {
            chunks: manifest.chunks.clone(),
        }
    }
}

#[async_trait]
impl ChunkExecutor for ManifestExecutor {
    async fn execute_chunk(
        &self,
        _source: &SourceLocation,
        chunk_index: u64,
        _chunk_size: u32,
    ) -> Result<ChunkOutcome, ExecutionError> {
        let chunk = self
            .chunks
            .get(chunk_index as usize)
            .ok_or_else(|| ExecutionError::Unhandled(format!("no chunk {chunk_index} in manifest")))?;
        match &chunk.fail {
            Some(message) => Err(ExecutionError::Unhandled(message.clone())),
            None => Ok(chunk.outcome()),
        }
    }
}

/// Store stand-in for replayed scans. Clearing is a logged no-op.
pub struct ReplayStore;

#[async_trait]
impl StoreMaintenance for ReplayStore {
    async fn clear_store(&self) -> Result<(), ClearError> {
        info!("Replay store cleared (no-op)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(raw: &str) -> Manifest {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn test_plan_sums_manifest_chunks() {
        let manifest = manifest(
            r#"{
                "source": "archives",
                "chunk_size": 10,
                "chunks": [
                    {"imported": 10, "regions": {"Salto": 10}},
                    {"imported": 4, "errors": 1, "regions": {"Rivera": 5}}
                ]
            }"#,
        );
        let planner = ManifestPlanner::new(manifest.clone());
        let plan = planner.plan_scan(&manifest.source()).await.unwrap();

        assert_eq!(plan.total_items, 15);
        assert_eq!(plan.total_chunks, 2);
        assert_eq!(plan.per_region_counts["Salto"], 10);
        assert_eq!(plan.per_region_counts["Rivera"], 5);
    }

    #[tokio::test]
    async fn test_executor_replays_failures() {
        let manifest = manifest(
            r#"{
                "source": "archives",
                "chunks": [
                    {"imported": 10},
                    {"fail": "backend unavailable"}
                ]
            }"#,
        );
        let executor = ManifestExecutor::new(&manifest);
        let source = manifest.source();

        let ok = executor.execute_chunk(&source, 0, 10).await.unwrap();
        assert_eq!(ok.stats.imported, 10);

        let err = executor.execute_chunk(&source, 1, 10).await.unwrap_err();
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[test]
    fn test_manifest_error_details_become_item_errors() {
        let manifest = manifest(
            r#"{
                "source": "archives",
                "chunks": [
                    {
                        "imported": 9,
                        "errors": 1,
                        "error_details": [
                            {"message": "pdf parsing failed", "source_item": "acta_17.pdf", "region": "Artigas"}
                        ]
                    }
                ]
            }"#,
        );
        let outcome = manifest.chunks[0].outcome();
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].source_item.as_deref(), Some("acta_17.pdf"));
        assert_eq!(outcome.stats.processed, 10);
    }
}

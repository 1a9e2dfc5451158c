//! Handler functions for graph commands.
//!
//! These functions implement the logic behind `query`, `ingest`, and
//! `stats`. Each opens its store through [`crate::factory`].

use std::path::{Path, PathBuf};

use log::info;
use prairie_core::traits::ConfigProvider;
use prairie_core::{Error, Result};
use prairie_dgraph::RdfStager;
use prairie_graph::{
    Backend, GraphStats, GraphStore, HitReport, IngestStats, compute_stats, ingest, quick_summary,
};

use crate::factory::{StoreConfig, open_store, save_handle};

// ============================================================================
// Input
// ============================================================================

/// Read `header<TAB>k-mer` lines, skipping blanks and `#` comments.
pub fn read_pairs(path: &Path) -> Result<Vec<(String, String)>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
    let mut pairs = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let (header, kmer) = line.split_once('\t').ok_or_else(|| {
            Error::invalid_data(format!(
                "{}:{}: expected 'header<TAB>k-mer'",
                path.display(),
                lineno + 1
            ))
        })?;
        let kmer = kmer.trim();
        if kmer.is_empty() {
            return Err(Error::invalid_data(format!(
                "{}:{}: empty k-mer",
                path.display(),
                lineno + 1
            )));
        }
        pairs.push((header.to_string(), kmer.to_string()));
    }
    Ok(pairs)
}

// ============================================================================
// Core operations
// ============================================================================

/// Every sequence from `src` to `dst`, grouped by sample and contig.
pub async fn query_report(
    store: &dyn GraphStore,
    src: &str,
    dst: &str,
    overlap: usize,
) -> Result<HitReport> {
    let paths = store.path(src, dst).await?;
    info!("{} path(s) from {src} to {dst}", paths.len());
    Ok(HitReport::from_paths(&paths, overlap))
}

/// Load `pairs` into `store` and persist it.
pub async fn ingest_into(
    store: &dyn GraphStore,
    sample: &str,
    pairs: Vec<(String, String)>,
    handle: Option<&Path>,
) -> Result<IngestStats> {
    let stats = ingest(store, sample, pairs).await?;
    store.save(handle).await?;
    Ok(stats)
}

fn print_ingest(sample: &str, stats: &IngestStats) {
    println!("Ingested sample {sample}:");
    println!("  Contigs: {}", stats.contigs);
    println!("  K-mers:  {}", stats.kmers);
    println!("  Edges:   {}", stats.edges);
}

// ============================================================================
// Handlers
// ============================================================================

/// `prairie query`.
pub async fn handle_query<C: StoreConfig>(
    config: &C,
    src: &str,
    dst: &str,
    backend: Option<Backend>,
    overlap: Option<usize>,
) -> Result<()> {
    let backend = backend.unwrap_or_else(|| config.default_backend());
    let store = open_store(config, backend).await?;
    let overlap = overlap.unwrap_or_else(|| config.overlap());

    let report = query_report(&*store, src, dst, overlap).await?;
    if report.is_empty() {
        println!("No sequences found from {src} to {dst}.");
    } else {
        print!("{report}");
    }
    Ok(())
}

/// `prairie ingest`.
pub async fn handle_ingest<C: StoreConfig>(
    config: &C,
    sample: &str,
    pairs: &Path,
    backend: Option<Backend>,
) -> Result<()> {
    let pairs = read_pairs(pairs)?;
    let backend = backend.unwrap_or_else(|| config.default_backend());
    let store = open_store(config, backend).await?;
    let handle = save_handle(config, backend)?;

    let stats = ingest_into(&*store, sample, pairs, handle.as_deref()).await?;
    print_ingest(sample, &stats);
    Ok(())
}

/// `prairie ingest --stage`: append the sample as RDF for `dgraph bulk`.
pub async fn handle_stage<C: StoreConfig>(
    config: &C,
    sample: &str,
    pairs: &Path,
) -> Result<PathBuf> {
    let pairs = read_pairs(pairs)?;
    let rdf = config.store_path("staging")?.join(format!("{sample}.rdf"));
    let stager = RdfStager::new();

    let stats = ingest_into(&stager, sample, pairs, Some(&rdf)).await?;
    print_ingest(sample, &stats);
    println!("  RDF:     {}", rdf.display());
    Ok(rdf)
}

/// `prairie stats`.
pub async fn handle_stats<C: StoreConfig>(
    config: &C,
    backend: Option<Backend>,
) -> Result<GraphStats> {
    let backend = backend.unwrap_or_else(|| config.default_backend());
    let store = open_store(config, backend).await?;
    let stats = compute_stats(&*store).await?;

    println!("Graph statistics ({backend}):");
    println!("  {}", quick_summary(&stats));
    println!("  Samples:        {}", stats.sample_distribution.len());
    println!("  Orphan nodes:   {}", stats.orphan_count);
    println!("  Max out-degree: {}", stats.max_out_degree);
    if let Some(node) = &stats.busiest_node {
        println!("  Busiest node:   {node}");
    }
    for (sample, contigs) in &stats.sample_distribution {
        println!("    {sample}: {contigs} contigs");
    }
    Ok(stats)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrairieConfig;
    use prairie_graph::MemoryStore;
    use tempfile::TempDir;

    fn write_pairs(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn config_in(dir: &TempDir) -> PrairieConfig {
        let mut config = PrairieConfig {
            base_path: Some(dir.path().to_string_lossy().into_owned()),
            ..Default::default()
        };
        config.graph.k = 11;
        config
    }

    #[test]
    fn test_read_pairs() {
        let dir = TempDir::new().unwrap();
        let path = write_pairs(
            &dir,
            "s1.tsv",
            "# sample s1\n>contig1 len=12\tCCGGAAGAAAA\n\n>contig1 len=12\tCGGAAGAAAAA\r\n",
        );
        let pairs = read_pairs(&path).unwrap();
        assert_eq!(
            pairs,
            vec![
                (">contig1 len=12".to_string(), "CCGGAAGAAAA".to_string()),
                (">contig1 len=12".to_string(), "CGGAAGAAAAA".to_string()),
            ]
        );
    }

    #[test]
    fn test_read_pairs_rejects_malformed_line() {
        let dir = TempDir::new().unwrap();
        let path = write_pairs(&dir, "bad.tsv", ">c1\tAAA\n>c1 AAC\n");
        let err = read_pairs(&path).unwrap_err();
        assert!(err.to_string().contains("bad.tsv:2"), "got {err}");
    }

    #[tokio::test]
    async fn test_ingest_then_query_reassembles() {
        let store = MemoryStore::new();
        let pairs = vec![
            (">contig1".to_string(), "CCGGAAGAAAA".to_string()),
            (">contig1".to_string(), "CGGAAGAAAAA".to_string()),
        ];
        let stats = ingest_into(&store, "s1", pairs, None).await.unwrap();
        assert_eq!(stats.edges, 1);

        let report = query_report(&store, "CCGGAAGAAAA", "CGGAAGAAAAA", 10)
            .await
            .unwrap();
        let variants = &report.samples["s1"]["contig1"];
        assert!(variants.contains("CCGGAAGAAAAA"));
    }

    #[tokio::test]
    async fn test_query_without_path_is_empty() {
        let store = MemoryStore::new();
        let report = query_report(&store, "AAAA", "CCCC", 3).await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_handle_ingest_memory_persists_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let pairs = write_pairs(&dir, "s1.tsv", ">c1\tAAAC\n>c1\tAACG\n>c1\tACGT\n");

        handle_ingest(&config, "s1", &pairs, Some(Backend::Memory))
            .await
            .unwrap();
        assert!(dir.path().join("pangenome.json").exists());

        let stats = handle_stats(&config, Some(Backend::Memory)).await.unwrap();
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.node_count, 3);
    }

    #[tokio::test]
    async fn test_handle_ingest_embedded() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let pairs = write_pairs(&dir, "s1.tsv", ">c1\tAAAC\n>c1\tAACG\n");

        handle_ingest(&config, "s1", &pairs, Some(Backend::Embedded))
            .await
            .unwrap();
        handle_query(&config, "AAAC", "AACG", Some(Backend::Embedded), Some(3))
            .await
            .unwrap();
        let stats = handle_stats(&config, Some(Backend::Embedded)).await.unwrap();
        assert_eq!(stats.edge_count, 1);
    }

    #[tokio::test]
    async fn test_handle_stage_writes_rdf() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let pairs = write_pairs(&dir, "s1.tsv", ">c1\tAAAC\n>c1\tAACG\n");

        let rdf = handle_stage(&config, "s1", &pairs).await.unwrap();
        assert_eq!(rdf, dir.path().join("rdf").join("s1.rdf"));
        let text = std::fs::read_to_string(&rdf).unwrap();
        assert!(text.contains("<lineage> \"s1::c1\""));
        assert!(text.contains("<ordinal> \"0\"^^<xs:int>"));
    }
}

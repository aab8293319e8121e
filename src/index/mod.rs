// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 近似最近邻索引
//!
//! An HNSW graph built from one store snapshot. Handles are immutable: new
//! records mean a new build.

pub mod cache;

use crate::config::IndexConfig;
use crate::domain::ChunkRef;
use crate::error::AppError;
use crate::store::Snapshot;
use crate::utils::{
    DEFAULT_HNSW_EF_CONSTRUCTION, DEFAULT_HNSW_EF_SEARCH, DEFAULT_HNSW_MAX_CONNECTIONS,
    HNSW_MAX_LAYERS,
};
use hnsw_rs::prelude::*;
use ndarray::ArrayView2;
use std::collections::HashMap;

pub use cache::IndexCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexParams {
    pub max_connections: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_HNSW_MAX_CONNECTIONS,
            ef_construction: DEFAULT_HNSW_EF_CONSTRUCTION,
            ef_search: DEFAULT_HNSW_EF_SEARCH,
        }
    }
}

impl From<&IndexConfig> for IndexParams {
    fn from(config: &IndexConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
        }
    }
}

/// One neighbour of a query row. `distance` is squared L2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub row: usize,
    pub distance: f32,
}

pub struct IndexHandle {
    graph: Option<Hnsw<'static, f32, DistL2>>,
    /// Graph node id -> snapshot rows holding that exact vector.
    nodes: Vec<Vec<usize>>,
    metadata: Vec<ChunkRef>,
    dimension: usize,
    ef_search: usize,
}

/// HNSW 索引构建器
pub struct SimilarityIndex;

impl SimilarityIndex {
    /// Build a graph over every snapshot row. An empty snapshot gives a valid
    /// handle whose searches report that no data is available.
    pub fn build(snapshot: Snapshot, params: IndexParams) -> Result<IndexHandle, AppError> {
        if params.max_connections == 0 || params.ef_construction == 0 {
            return Err(AppError::IndexError(
                "max_connections and ef_construction must be greater than 0".to_string(),
            ));
        }

        let Snapshot { vectors, metadata } = snapshot;
        let count = metadata.len();
        if vectors.nrows() != count {
            return Err(AppError::IndexError(format!(
                "snapshot has {} vectors but {} metadata entries",
                vectors.nrows(),
                count
            )));
        }

        if count == 0 {
            return Ok(IndexHandle {
                graph: None,
                nodes: Vec::new(),
                metadata,
                dimension: vectors.ncols(),
                ef_search: params.ef_search,
            });
        }

        let dimension = vectors.ncols();
        if dimension == 0 {
            return Err(AppError::IndexError("vectors have dimension 0".to_string()));
        }

        // 相同向量合并为一个节点，否则重复节点会占满邻居表
        let mut node_of: HashMap<Vec<u32>, usize> = HashMap::new();
        let mut nodes: Vec<Vec<usize>> = Vec::new();
        let mut unique: Vec<Vec<f32>> = Vec::new();
        for (row, vector) in vectors.outer_iter().enumerate() {
            let key: Vec<u32> = vector.iter().map(|x| x.to_bits()).collect();
            let node = *node_of.entry(key).or_insert_with(|| {
                nodes.push(Vec::new());
                unique.push(vector.to_vec());
                nodes.len() - 1
            });
            nodes[node].push(row);
        }

        let node_count = unique.len();
        let max_layer = HNSW_MAX_LAYERS
            .min((node_count as f32).ln().ceil() as usize)
            .max(1);
        let mut graph = Hnsw::<f32, DistL2>::new(
            params.max_connections,
            node_count,
            max_layer,
            params.ef_construction,
            DistL2 {},
        );

        for (node, data) in unique.iter().enumerate() {
            graph.insert((data.as_slice(), node));
        }
        graph.set_searching_mode(true);

        tracing::debug!(
            "Built HNSW index: rows={}, nodes={}, dimension={}, M={}, max_layer={}",
            count,
            node_count,
            dimension,
            params.max_connections,
            max_layer
        );

        Ok(IndexHandle {
            graph: Some(graph),
            nodes,
            metadata,
            dimension,
            ef_search: params.ef_search,
        })
    }
}

impl IndexHandle {
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Search effort for one query: never below k, and wide enough on small
    /// graphs to visit most of them.
    fn effective_ef(&self, k: usize) -> usize {
        let mut ef = self.ef_search.max(k);
        let nodes = self.nodes.len();
        if nodes <= 1024 {
            ef = ef.max((nodes.max(k) * 4).max(32).min(2048));
        }
        ef
    }

    /// k nearest rows for every query row, closest first. At most
    /// `min(k, len)` hits per query.
    pub fn search(&self, queries: ArrayView2<'_, f32>, k: usize) -> Result<Vec<Vec<Hit>>, AppError> {
        if k == 0 {
            return Err(AppError::InvalidInput("k must be greater than 0".to_string()));
        }
        if queries.nrows() == 0 {
            return Ok(Vec::new());
        }

        let Some(graph) = &self.graph else {
            return Err(AppError::NoData("the index holds no vectors".to_string()));
        };

        if queries.ncols() != self.dimension {
            return Err(AppError::InvalidInput(format!(
                "query dimension {} does not match index dimension {}",
                queries.ncols(),
                self.dimension
            )));
        }

        let ef = self.effective_ef(k);
        let results = queries
            .outer_iter()
            .map(|query| {
                let query = query.to_vec();
                // k nearest nodes always cover the k nearest rows
                let mut hits: Vec<Hit> = graph
                    .search(&query, k, ef)
                    .into_iter()
                    .flat_map(|n| {
                        let distance = n.distance * n.distance;
                        self.nodes
                            .get(n.d_id)
                            .into_iter()
                            .flatten()
                            .map(move |&row| Hit { row, distance })
                    })
                    .collect();
                hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
                hits.truncate(k);
                hits
            })
            .collect();

        Ok(results)
    }

    /// Map a row from `search` back to its chunk.
    pub fn resolve(&self, row: usize) -> Result<&ChunkRef, AppError> {
        self.metadata.get(row).ok_or_else(|| {
            AppError::IndexError(format!(
                "row {} out of range for index of {} entries",
                row,
                self.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EmbeddingRecord;
    use ndarray::{Array2, array};

    fn snapshot(rows: &[(&str, usize, Vec<f32>)]) -> Snapshot {
        Snapshot::from_records(
            rows.iter()
                .map(|(id, idx, v)| EmbeddingRecord {
                    report_id: id.to_string(),
                    chunk_index: *idx,
                    vector: v.clone(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_index_search_is_no_data() {
        let handle = SimilarityIndex::build(Snapshot::empty(), IndexParams::default()).unwrap();
        assert!(handle.is_empty());

        let result = handle.search(array![[1.0f32, 0.0]].view(), 3);
        assert!(matches!(result, Err(AppError::NoData(_))));
    }

    #[test]
    fn test_identical_vector_has_zero_distance() {
        let handle = SimilarityIndex::build(
            snapshot(&[("a", 0, vec![0.3, 0.4, 0.5])]),
            IndexParams::default(),
        )
        .unwrap();

        let hits = handle.search(array![[0.3f32, 0.4, 0.5]].view(), 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0][0].row, 0);
        assert!(hits[0][0].distance.abs() < 1e-6);
        assert_eq!(handle.resolve(0).unwrap().report_id, "a");
    }

    #[test]
    fn test_distance_is_squared_l2() {
        let handle = SimilarityIndex::build(
            snapshot(&[("a", 0, vec![3.0, 4.0])]),
            IndexParams::default(),
        )
        .unwrap();

        let hits = handle.search(array![[0.0f32, 0.0]].view(), 1).unwrap();
        assert!((hits[0][0].distance - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_hits_are_sorted_and_capped_by_index_size() {
        let handle = SimilarityIndex::build(
            snapshot(&[
                ("far", 0, vec![10.0, 0.0]),
                ("near", 0, vec![1.0, 0.0]),
                ("mid", 0, vec![4.0, 0.0]),
            ]),
            IndexParams::default(),
        )
        .unwrap();

        let hits = handle.search(array![[0.0f32, 0.0]].view(), 5).unwrap();
        let ids: Vec<&str> = hits[0]
            .iter()
            .map(|h| handle.resolve(h.row).unwrap().report_id.as_str())
            .collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_k_zero_and_no_queries() {
        let handle =
            SimilarityIndex::build(snapshot(&[("a", 0, vec![1.0])]), IndexParams::default())
                .unwrap();

        assert!(matches!(
            handle.search(array![[1.0f32]].view(), 0),
            Err(AppError::InvalidInput(_))
        ));
        let none = Array2::<f32>::zeros((0, 1));
        assert!(handle.search(none.view(), 3).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let handle =
            SimilarityIndex::build(snapshot(&[("a", 0, vec![1.0, 2.0])]), IndexParams::default())
                .unwrap();
        assert!(matches!(
            handle.search(array![[1.0f32, 2.0, 3.0]].view(), 1),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_many_identical_rows_do_not_hide_other_vectors() {
        let mut rows: Vec<(&str, usize, Vec<f32>)> =
            (0..300).map(|i| ("dup", i, vec![1.0, 0.0, 0.0])).collect();
        rows.push(("other", 0, vec![0.0, 1.0, 0.0]));
        let handle = SimilarityIndex::build(snapshot(&rows), IndexParams::default()).unwrap();
        assert_eq!(handle.len(), 301);

        let hits = handle.search(array![[0.0f32, 1.0, 0.0]].view(), 5).unwrap();
        assert_eq!(hits[0].len(), 5);
        let top = handle.resolve(hits[0][0].row).unwrap();
        assert_eq!(top.report_id, "other");
        assert!(hits[0][0].distance.abs() < 1e-6);
        assert!(hits[0][1..].iter().all(|h| (h.distance - 2.0).abs() < 1e-4));
    }

    #[test]
    fn test_identical_rows_all_come_back() {
        let handle = SimilarityIndex::build(
            snapshot(&[
                ("a", 0, vec![0.5, 0.5]),
                ("b", 0, vec![0.5, 0.5]),
                ("c", 0, vec![3.0, 3.0]),
            ]),
            IndexParams::default(),
        )
        .unwrap();

        let hits = handle.search(array![[0.5f32, 0.5]].view(), 2).unwrap();
        let mut ids: Vec<&str> = hits[0]
            .iter()
            .map(|h| handle.resolve(h.row).unwrap().report_id.as_str())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_resolve_out_of_range() {
        let handle =
            SimilarityIndex::build(snapshot(&[("a", 0, vec![1.0])]), IndexParams::default())
                .unwrap();
        assert!(handle.resolve(1).is_err());
    }
}

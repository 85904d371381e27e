use std::path::PathBuf;

use thiserror::Error;

use crate::datasets::Split;

/// Integrity failures detected while loading and joining a dataset.
///
/// These travel inside `anyhow::Error` and can be recovered with
/// `err.downcast_ref::<DatasetError>()`.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("dataset not found at {0} (enable download to fetch it)")]
    NotFound(PathBuf),

    #[error("label count {labels} does not match number of nodes {num_nodes}")]
    LabelCountMismatch { labels: usize, num_nodes: usize },

    #[error("identifier mapping has {mapping_rows} rows but the graph has {num_nodes} nodes")]
    MappingMismatch {
        mapping_rows: usize,
        num_nodes: usize,
    },

    #[error("identifier mapping references node {node} outside 0..{num_nodes}")]
    MappingOutOfRange { node: u32, num_nodes: usize },

    #[error("identifier mapping lists node idx {0} more than once")]
    DuplicateNodeIdx(u32),

    #[error("{split} split references node {node} outside 0..{num_nodes}")]
    SplitOutOfRange {
        split: Split,
        node: u32,
        num_nodes: usize,
    },

    #[error("node {node} appears in more than one split (found again in {split})")]
    SplitOverlap { split: Split, node: u32 },

    #[error("node {0} is not assigned to any split")]
    SplitNotExhaustive(u32),

    #[error("node {0} has no title or abstract")]
    MissingText(u32),
}

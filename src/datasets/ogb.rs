use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use polars::prelude::*;

use super::{download_and_extract, parse_u32, read_csv_gz, CompressionFormat};
use super::{traits::NodePropPredDataset, SplitIndex};
use crate::error::DatasetError;

/// Where an OGB node property prediction dataset lives and how it is laid out.
#[derive(Debug)]
pub struct DatasetInfo {
    pub name: &'static str,
    /// Directory under the root, e.g. `ogbn_arxiv`.
    pub dir_name: &'static str,
    pub url: &'static str,
    /// Top-level directory inside the downloaded archive.
    pub download_name: &'static str,
    /// Subdirectory of `split/` holding the predefined split.
    pub split: &'static str,
}

pub static OGBN_ARXIV: DatasetInfo = DatasetInfo {
    name: "ogbn-arxiv",
    dir_name: "ogbn_arxiv",
    url: "http://snap.stanford.edu/ogb/data/nodeproppred/arxiv.zip",
    download_name: "arxiv",
    split: "time",
};

static KNOWN_DATASETS: &[&DatasetInfo] = &[&OGBN_ARXIV];

impl DatasetInfo {
    pub fn lookup(name: &str) -> Result<&'static DatasetInfo, DatasetError> {
        KNOWN_DATASETS
            .iter()
            .copied()
            .find(|info| info.name == name)
            .ok_or_else(|| DatasetError::UnknownDataset(name.to_owned()))
    }
}

#[derive(Debug, Clone)]
pub struct OgbGraph {
    pub num_nodes: usize,
    /// Columns `source`, `target` (`u32`).
    pub edge_df: DataFrame,
}

#[derive(Debug, Clone)]
pub struct OgbNodeDataset {
    info: &'static DatasetInfo,
    dir: PathBuf,
    pub graph: OgbGraph,
    /// Shape `(num_nodes, 1)`, `i64`.
    pub labels: Tensor,
    split_index: SplitIndex,
}
impl OgbNodeDataset {
    pub fn new<P: AsRef<Path>>(name: &str, root: P, download: bool) -> Result<Self> {
        let info = DatasetInfo::lookup(name)?;
        let dir = Self::prepare_data(info, root, download)?;
        Self::from_dir(info, dir)
    }

    /// Returns the dataset directory, downloading it first if allowed.
    pub fn prepare_data<P: AsRef<Path>>(
        info: &DatasetInfo,
        root: P,
        download: bool,
    ) -> Result<PathBuf> {
        let root = root.as_ref();
        let dir = root.join(info.dir_name);
        if dir.exists() {
            return Ok(dir);
        }
        if !download {
            return Err(DatasetError::NotFound(dir).into());
        }
        create_dir_all(root)?;
        // extract next to the final location so the rename stays on one filesystem
        let staging = tempfile::tempdir_in(root)?;
        download_and_extract(info.url, staging.path(), CompressionFormat::Zip)?;
        std::fs::rename(staging.path().join(info.download_name), &dir).with_context(|| {
            format!(
                "archive from {} has no '{}' directory",
                info.url, info.download_name
            )
        })?;
        Ok(dir)
    }

    pub fn from_dir<P: AsRef<Path>>(info: &'static DatasetInfo, dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let raw = dir.join("raw");

        let num_nodes = {
            let df = read_csv_gz(raw.join("num-node-list.csv.gz"), false)?;
            let num_nodes = parse_u32(&df[0])?;
            num_nodes
                .u32()?
                .get(0)
                .context("num-node-list.csv.gz is empty")? as usize
        };

        let edge_df = {
            let mut df = read_csv_gz(raw.join("edge.csv.gz"), false)?;
            df.set_column_names(&["source", "target"])?;
            let source = parse_u32(&df["source"])?;
            let target = parse_u32(&df["target"])?;
            DataFrame::new(vec![source, target])?
        };

        let labels = {
            let df = read_csv_gz(raw.join("node-label.csv.gz"), false)?;
            let labels = df[0]
                .strict_cast(&DataType::Int64)
                .context("node labels are not integers")?;
            let labels: Vec<i64> = labels.i64()?.into_no_null_iter().collect();
            if labels.len() != num_nodes {
                return Err(DatasetError::LabelCountMismatch {
                    labels: labels.len(),
                    num_nodes,
                }
                .into());
            }
            Tensor::from_vec(labels, (num_nodes, 1), &Device::Cpu)?
        };

        let split_index = {
            let split_dir = dir.join("split").join(info.split);
            let read = |name: &str| -> Result<Vec<u32>> {
                let df = read_csv_gz(split_dir.join(format!("{}.csv.gz", name)), false)?;
                let idx = parse_u32(&df[0])?;
                let idx = idx.u32()?.into_no_null_iter().collect();
                Ok(idx)
            };
            SplitIndex::new(read("train")?, read("valid")?, read("test")?)
        };
        split_index.validate(num_nodes)?;

        tracing::info!(
            dataset = info.name,
            num_nodes,
            num_edges = edge_df.height(),
            train = split_index.train.len(),
            valid = split_index.valid.len(),
            test = split_index.test.len(),
            "loaded dataset"
        );
        Ok(Self {
            info,
            dir: dir.to_owned(),
            graph: OgbGraph { num_nodes, edge_df },
            labels,
            split_index,
        })
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `mapping/nodeidx2paperid.csv.gz` inside the dataset directory.
    pub fn mapping_path(&self) -> PathBuf {
        mapping_path(&self.dir)
    }
}

pub fn mapping_path<P: AsRef<Path>>(dataset_dir: P) -> PathBuf {
    dataset_dir
        .as_ref()
        .join("mapping")
        .join("nodeidx2paperid.csv.gz")
}

impl NodePropPredDataset for OgbNodeDataset {
    fn num_nodes(&self) -> usize {
        self.graph.num_nodes
    }
    fn labels(&self) -> &Tensor {
        &self.labels
    }
    fn split_index(&self) -> &SplitIndex {
        &self.split_index
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::utils::testing::write_gz;

    #[test]
    fn lookup_known_and_unknown() {
        assert_eq!(DatasetInfo::lookup("ogbn-arxiv").unwrap().dir_name, "ogbn_arxiv");
        assert!(matches!(
            DatasetInfo::lookup("ogbn-products"),
            Err(DatasetError::UnknownDataset(_))
        ));
    }

    #[test]
    fn loads_fixture() {
        let root = tempfile::tempdir().unwrap();
        fixture::write_arxiv(root.path());

        let dataset = OgbNodeDataset::new("ogbn-arxiv", root.path(), false).unwrap();
        assert_eq!(dataset.name(), "ogbn-arxiv");
        assert_eq!(dataset.num_nodes(), 5);
        assert_eq!(dataset.graph.edge_df.shape(), (4, 2));
        assert_eq!(dataset.labels.dims(), &[5, 1]);
        assert_eq!(dataset.split_index().train, vec![0, 1, 3]);
        assert_eq!(dataset.split_index().valid, vec![2]);
        assert_eq!(dataset.split_index().test, vec![4]);
        assert!(dataset.mapping_path().exists());
    }

    #[test]
    fn missing_dataset_without_download() {
        let root = tempfile::tempdir().unwrap();
        let err = OgbNodeDataset::new("ogbn-arxiv", root.path(), false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::NotFound(_))
        ));
    }

    #[test]
    fn label_count_must_match_nodes() {
        let root = tempfile::tempdir().unwrap();
        let dir = fixture::write_arxiv(root.path());
        write_gz(dir.join("raw/node-label.csv.gz"), "4\n0\n4\n");

        let err = OgbNodeDataset::from_dir(&OGBN_ARXIV, &dir).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::LabelCountMismatch {
                labels: 3,
                num_nodes: 5
            })
        ));
    }

    #[test]
    fn overlapping_splits_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let dir = fixture::write_arxiv(root.path());
        write_gz(dir.join("split/time/test.csv.gz"), "4\n0\n");

        let err = OgbNodeDataset::from_dir(&OGBN_ARXIV, &dir).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::SplitOverlap { node: 0, .. })
        ));
    }
}

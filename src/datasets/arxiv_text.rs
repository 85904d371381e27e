use std::{
    fs::{create_dir_all, File},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use itertools::Itertools;
use polars::prelude::*;

use super::{download_and_extract, parse_u32, read_csv_gz, CompressionFormat};
use super::{traits::NodePropPredDataset, OgbNodeDataset, Split, SplitIndex};
use crate::error::DatasetError;
use crate::utils::flatten_labels;

pub const NODE_IDX: &str = "node idx";
pub const PAPER_ID: &str = "paper id";
pub const LABEL: &str = "label";
pub const TITLE: &str = "title";
pub const ABSTRACT: &str = "abstract";
pub const TEXT: &str = "text";
const TEXT_ROW: &str = "__text_row";

pub const TITLEABS_URL: &str = "https://snap.stanford.edu/ogb/data/misc/ogbn_arxiv/titleabs.tsv.gz";

#[derive(Debug, Clone)]
pub struct ArxivTextConfig {
    pub dataset: String,
    /// Directory holding `ogbn_arxiv/`.
    pub root: PathBuf,
    /// Defaults to `mapping/nodeidx2paperid.csv.gz` inside the dataset.
    pub mapping_path: Option<PathBuf>,
    /// Headerless `paper id \t title \t abstract`.
    pub text_path: PathBuf,
    /// Fetch the dataset and the text file when they are missing.
    pub download: bool,
}
impl ArxivTextConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            dataset: "ogbn-arxiv".to_owned(),
            root: root.to_owned(),
            mapping_path: None,
            text_path: root.join("titleabs.tsv"),
            download: false,
        }
    }
    pub fn with_text_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.text_path = path.as_ref().to_owned();
        self
    }
    pub fn with_mapping_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.mapping_path = Some(path.as_ref().to_owned());
        self
    }
    pub fn with_download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }
}
impl Default for ArxivTextConfig {
    fn default() -> Self {
        Self::new("arxiv")
    }
}

/// Labelled node texts of `ogbn-arxiv`, one table per split.
///
/// Every table has the columns `node idx` (`u32`), `label` (`i64`) and
/// `text` (title and abstract joined by a space).
#[derive(Debug, Clone)]
pub struct ArxivText {
    pub train: DataFrame,
    pub valid: DataFrame,
    pub test: DataFrame,
}
impl ArxivText {
    pub fn load(config: &ArxivTextConfig) -> Result<Self> {
        let dataset = OgbNodeDataset::new(&config.dataset, &config.root, config.download)?;
        let mapping_path = match &config.mapping_path {
            Some(path) => path.clone(),
            None => dataset.mapping_path(),
        };
        prepare_text(&config.text_path, config.download)?;
        Self::from_dataset(&dataset, mapping_path, &config.text_path)
    }

    pub fn from_dataset<D, P, Q>(dataset: &D, mapping_path: P, text_path: Q) -> Result<Self>
    where
        D: NodePropPredDataset,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let labels = extract_labels(dataset.labels())?;
        if labels.height() != dataset.num_nodes() {
            return Err(DatasetError::LabelCountMismatch {
                labels: labels.height(),
                num_nodes: dataset.num_nodes(),
            }
            .into());
        }
        let mapping = load_mapping(mapping_path)?;
        let text = load_text(text_path)?;
        let joined = join_text(&mapping, &labels, &text)?;
        Self::from_joined(&joined, dataset.split_index())
    }

    pub fn from_joined(joined: &DataFrame, split_index: &SplitIndex) -> Result<Self> {
        let [train, valid, test] = split_index.partition(joined, NODE_IDX)?;
        for (split, df) in Split::ALL.iter().zip([&train, &valid, &test]) {
            let expected = split_index.get(*split).len();
            if df.height() < expected {
                tracing::debug!(%split, rows = df.height(), expected, "split lost nodes in the join");
            }
        }
        Ok(Self { train, valid, test })
    }

    pub fn get(&self, split: Split) -> &DataFrame {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    /// Labels of one split as a 1-d `i64` tensor, in table order.
    pub fn labels(&self, split: Split, device: &Device) -> Result<Tensor> {
        let labels: Vec<i64> = self.get(split)[LABEL].i64()?.into_no_null_iter().collect();
        let n = labels.len();
        Ok(Tensor::from_vec(labels, n, device)?)
    }

    /// Node indices of one split as a 1-d `u32` tensor, in table order.
    pub fn node_indices(&self, split: Split, device: &Device) -> Result<Tensor> {
        let idx: Vec<u32> = self.get(split)[NODE_IDX]
            .u32()?
            .into_no_null_iter()
            .collect();
        Ok(crate::utils::indices_to_tensor(&idx, device)?)
    }

    /// Writes `train.parquet`, `valid.parquet` and `test.parquet` into `dir`.
    pub fn write_parquet<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        create_dir_all(dir)?;
        for split in Split::ALL {
            let path = dir.join(format!("{}.parquet", split));
            let mut df = self.get(split).clone();
            ParquetWriter::new(File::create(&path)?).finish(&mut df)?;
            tracing::info!(%split, rows = df.height(), path = %path.display(), "wrote split");
        }
        Ok(())
    }
}

/// Flattens a `(N, 1)` or `(N,)` label tensor into a `node idx`/`label` table
/// where row `i` holds node `i`.
pub fn extract_labels(labels: &Tensor) -> Result<DataFrame> {
    let labels = flatten_labels(labels)?;
    let node_idx: Vec<u32> = (0..labels.len() as u32).collect();
    Ok(df! {
        NODE_IDX => node_idx,
        LABEL => labels,
    }?)
}

/// Loads `nodeidx2paperid.csv.gz` as `node idx` (`u32`) and `paper id` (`str`).
pub fn load_mapping<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    let mut df = read_csv_gz(path, true)?;
    let node_idx = parse_u32(df.column(NODE_IDX)?)?;
    df.replace(NODE_IDX, node_idx)?;
    let df = df
        .select([NODE_IDX, PAPER_ID])
        .with_context(|| format!("unexpected columns in {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = df.height(), "loaded identifier mapping");
    Ok(df)
}

/// Loads the headerless `paper id \t title \t abstract` file, all columns as strings.
///
/// Duplicate paper ids are kept.
pub fn load_text<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    let mut df = CsvReader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .has_header(false)
        .with_separator(b'\t')
        .with_quote_char(None)
        .infer_schema(Some(0))
        .finish()
        .with_context(|| format!("failed to parse {}", path.display()))?;
    df.set_column_names(&[PAPER_ID, TITLE, ABSTRACT])
        .with_context(|| format!("expected 3 columns in {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = df.height(), "loaded titles and abstracts");
    Ok(df)
}

/// Fetches `titleabs.tsv` into `path` unless it is already there.
pub fn prepare_text<P: AsRef<Path>>(path: P, download: bool) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    if !download {
        return Err(DatasetError::NotFound(path.to_owned()).into());
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    create_dir_all(parent)?;
    let staging = tempfile::NamedTempFile::new_in(parent)?;
    download_and_extract(TITLEABS_URL, staging.path(), CompressionFormat::Gz)?;
    staging.persist(path)?;
    Ok(())
}

/// Checks that the mapping assigns exactly one paper to every node in `0..num_nodes`.
pub fn validate_mapping(mapping: &DataFrame, num_nodes: usize) -> Result<()> {
    if mapping.height() != num_nodes {
        return Err(DatasetError::MappingMismatch {
            mapping_rows: mapping.height(),
            num_nodes,
        }
        .into());
    }
    let node_idx = mapping.column(NODE_IDX)?.u32()?;
    if let Some(node) = node_idx
        .into_iter()
        .flatten()
        .find(|&node| node as usize >= num_nodes)
    {
        return Err(DatasetError::MappingOutOfRange { node, num_nodes }.into());
    }
    if let Some(node) = node_idx.into_iter().flatten().duplicates().next() {
        return Err(DatasetError::DuplicateNodeIdx(node).into());
    }
    Ok(())
}

pub fn concat_text(title: &str, abstract_: &str) -> String {
    format!("{} {}", title, abstract_)
}

/// Joins mapping, labels and texts into `node idx`, `label`, `text`.
///
/// The mapping is joined to `labels` on `node idx` after validation. Nodes
/// whose paper has no text are dropped; a paper listed several times in
/// `text` yields one row per listing. Rows are ordered by `node idx`, and
/// rows of the same node follow the order of `text`.
pub fn join_text(mapping: &DataFrame, labels: &DataFrame, text: &DataFrame) -> Result<DataFrame> {
    validate_mapping(mapping, labels.height())?;
    let with_label = mapping.inner_join(labels, [NODE_IDX], [NODE_IDX])?;

    let text = text.with_row_count(TEXT_ROW, None)?;
    let joined = with_label
        .inner_join(&text, [PAPER_ID], [PAPER_ID])?
        .sort([TEXT_ROW], false, true)?
        .sort([NODE_IDX], false, true)?;

    let matched = joined.column(NODE_IDX)?.n_unique()?;
    let dropped = with_label.height() - matched;
    if dropped > 0 {
        tracing::warn!(dropped, "nodes without title/abstract were dropped");
    }
    if joined.height() > matched {
        tracing::warn!(
            extra = joined.height() - matched,
            "duplicate paper ids produced extra rows"
        );
    }

    let node_idx = joined.column(NODE_IDX)?.u32()?;
    let title = joined.column(TITLE)?.utf8()?;
    let abstract_ = joined.column(ABSTRACT)?.utf8()?;
    let text = title
        .into_iter()
        .zip(abstract_.into_iter())
        .zip(node_idx.into_iter())
        .map(|((title, abstract_), node)| match (title, abstract_) {
            (Some(title), Some(abstract_)) => Ok(concat_text(title, abstract_)),
            _ => Err(DatasetError::MissingText(node.unwrap_or_default())),
        })
        .collect::<Result<Vec<String>, DatasetError>>()?;

    let mut out = joined.select([NODE_IDX, LABEL])?;
    out.with_column(Series::new(TEXT, text))?;
    tracing::info!(rows = out.height(), "joined labels with texts");
    Ok(out)
}

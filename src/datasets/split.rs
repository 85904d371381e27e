use anyhow::Result;
use candle_core::{Device, Tensor};
use polars::prelude::*;

use crate::error::DatasetError;
use crate::utils::indices_to_tensor;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Split {
    Train,
    Valid,
    Test,
}
impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Valid => "valid",
            Self::Test => "test",
        }
    }
}
impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Node indices of the predefined train/valid/test split.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SplitIndex {
    pub train: Vec<u32>,
    pub valid: Vec<u32>,
    pub test: Vec<u32>,
}
impl SplitIndex {
    pub fn new(train: Vec<u32>, valid: Vec<u32>, test: Vec<u32>) -> Self {
        Self { train, valid, test }
    }

    pub fn get(&self, split: Split) -> &[u32] {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Split, &[u32])> + '_ {
        Split::ALL.into_iter().map(move |split| (split, self.get(split)))
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks that the three sets are pairwise disjoint and cover `0..num_nodes`.
    pub fn validate(&self, num_nodes: usize) -> Result<(), DatasetError> {
        let mut seen = vec![false; num_nodes];
        for (split, nodes) in self.iter() {
            for &node in nodes {
                let slot = seen
                    .get_mut(node as usize)
                    .ok_or(DatasetError::SplitOutOfRange {
                        split,
                        node,
                        num_nodes,
                    })?;
                if *slot {
                    return Err(DatasetError::SplitOverlap { split, node });
                }
                *slot = true;
            }
        }
        match seen.iter().position(|assigned| !assigned) {
            Some(node) => Err(DatasetError::SplitNotExhaustive(node as u32)),
            None => Ok(()),
        }
    }

    pub fn to_tensor(&self, split: Split, device: &Device) -> candle_core::Result<Tensor> {
        indices_to_tensor(self.get(split), device)
    }

    /// Keeps the rows of `df` whose `key` column is in the given split,
    /// in the order they appear in `df`. Indices with no row are skipped.
    pub fn select(&self, df: &DataFrame, key: &str, split: Split) -> Result<DataFrame> {
        let members = Series::new(split.name(), self.get(split));
        let mask = is_in(df.column(key)?, &members)?;
        Ok(df.filter(&mask)?)
    }

    /// Splits `df` into train/valid/test tables keyed by `key`.
    pub fn partition(&self, df: &DataFrame, key: &str) -> Result<[DataFrame; 3]> {
        let [train, valid, test] = Split::ALL;
        Ok([
            self.select(df, key, train)?,
            self.select(df, key, valid)?,
            self.select(df, key, test)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined() -> DataFrame {
        df! {
            "node idx" => [0u32, 2, 5],
            "label" => [1i64, 2, 3],
            "text" => ["a", "b", "c"],
        }
        .unwrap()
    }

    fn node_idx(df: &DataFrame) -> Vec<u32> {
        df["node idx"].u32().unwrap().into_no_null_iter().collect()
    }

    #[test]
    fn validate_accepts_partition() {
        let split = SplitIndex::new(vec![0, 3], vec![1], vec![2, 4]);
        assert!(split.validate(5).is_ok());
        assert_eq!(split.len(), 5);
    }

    #[test]
    fn validate_rejects_overlap() {
        let split = SplitIndex::new(vec![0, 1], vec![1], vec![2]);
        match split.validate(3) {
            Err(DatasetError::SplitOverlap { split, node }) => {
                assert_eq!(split, Split::Valid);
                assert_eq!(node, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let split = SplitIndex::new(vec![0], vec![1], vec![7]);
        assert!(matches!(
            split.validate(2),
            Err(DatasetError::SplitOutOfRange { node: 7, .. })
        ));
    }

    #[test]
    fn validate_rejects_gap() {
        let split = SplitIndex::new(vec![0], vec![], vec![2]);
        assert!(matches!(
            split.validate(3),
            Err(DatasetError::SplitNotExhaustive(1))
        ));
    }

    #[test]
    fn select_drops_unmatched_indices() {
        let split = SplitIndex::new(vec![5, 0, 9], vec![2], vec![]);
        let train = split.select(&joined(), "node idx", Split::Train).unwrap();
        // joined-table order, not split order; 9 never made it through the join
        assert_eq!(node_idx(&train), vec![0, 5]);
    }

    #[test]
    fn partition_returns_three_tables() {
        let split = SplitIndex::new(vec![0, 5, 9], vec![2], vec![]);
        let [train, valid, test] = split.partition(&joined(), "node idx").unwrap();
        assert_eq!(node_idx(&train), vec![0, 5]);
        assert_eq!(node_idx(&valid), vec![2]);
        assert_eq!(test.height(), 0);
        assert_eq!(test.get_column_names(), &["node idx", "label", "text"]);
    }

    #[test]
    fn to_tensor_keeps_order() {
        let split = SplitIndex::new(vec![3, 1], vec![], vec![0, 2]);
        let t = split.to_tensor(Split::Train, &Device::Cpu).unwrap();
        assert_eq!(t.to_vec1::<u32>().unwrap(), vec![3, 1]);
    }
}

use candle_core::Tensor;

use super::SplitIndex;

/// A single-graph node property prediction dataset with a predefined split.
pub trait NodePropPredDataset {
    fn num_nodes(&self) -> usize;
    /// Shape `(num_nodes, 1)` or `(num_nodes,)`.
    fn labels(&self) -> &Tensor;
    fn split_index(&self) -> &SplitIndex;
}

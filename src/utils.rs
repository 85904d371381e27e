use candle_core::{Device, Result, Tensor};

pub fn indices_to_tensor(indices: &[u32], device: &Device) -> Result<Tensor> {
    Tensor::from_slice(indices, indices.len(), device)
}

/// Flattens a label tensor of shape `(N, 1)` or `(N,)` into `N` values.
pub fn flatten_labels(labels: &Tensor) -> Result<Vec<i64>> {
    labels
        .flatten_all()?
        .to_dtype(candle_core::DType::I64)?
        .to_vec1::<i64>()
}

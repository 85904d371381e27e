mod arxiv_text;
pub use arxiv_text::*;

pub mod ogb;
pub use ogb::{OgbGraph, OgbNodeDataset};

mod split;
pub use split::*;

mod traits;
pub use traits::*;

mod utils;
pub use utils::*;

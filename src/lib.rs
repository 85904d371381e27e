pub mod datasets;
pub mod error;
pub mod logging;
pub mod utils;

pub use datasets::{ArxivText, ArxivTextConfig, Split, SplitIndex};
pub use error::DatasetError;

//! Report module - summarizing CLTV results

pub mod model_export;
pub mod segments;
pub mod summary;

pub use model_export::*;
pub use segments::*;
pub use summary::*;

//! Pipeline module - CLTV estimation stages

pub mod bgnbd;
pub mod capping;
pub mod config;
pub mod error;
pub mod features;
pub mod forecast;
pub mod gamma_gamma;
pub mod loader;
pub mod optimize;
pub mod records;
pub mod special;
pub mod value;

pub use bgnbd::{BgNbdModel, BgNbdParams};
pub use capping::*;
pub use config::*;
pub use error::{CltvError, Result};
pub use features::*;
pub use forecast::*;
pub use gamma_gamma::{GammaGammaModel, GammaGammaParams};
pub use loader::*;
pub use optimize::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use records::*;
pub use value::*;

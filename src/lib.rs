//! cltv: Customer Lifetime Value Library
//!
//! A library for estimating customer lifetime value from per-customer
//! purchase summaries using outlier capping, BG/NBD purchase-frequency
//! and Gamma-Gamma monetary models, and quantile segmentation.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;

//! Shared test utilities and fixture generators

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use cltv::pipeline::CustomerRecord;
use polars::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Build one customer row with both channels filled in
pub fn customer(
    id: &str,
    first: NaiveDate,
    last: NaiveDate,
    orders_online: f64,
    orders_offline: f64,
    value_online: f64,
    value_offline: f64,
) -> CustomerRecord {
    CustomerRecord {
        master_id: id.to_string(),
        order_channel: "Android App".to_string(),
        last_order_channel: "Offline".to_string(),
        first_order_date: first,
        last_order_date: last,
        last_order_date_online: Some(last),
        last_order_date_offline: Some(last),
        order_num_total_ever_online: orders_online,
        order_num_total_ever_offline: orders_offline,
        customer_value_total_ever_offline: value_offline,
        customer_value_total_ever_online: value_online,
        interested_in_categories: vec!["KADIN".to_string()],
    }
}

/// Analysis date used by [`scenario_customers`]
pub fn scenario_analysis_date() -> NaiveDate {
    date(2021, 6, 1)
}

/// Three customers measured against [`scenario_analysis_date`]:
///
/// - `A`: 5 purchases, recency 10 weeks, tenure 20 weeks, average value 100
/// - `B`: 2 purchases, recency 1 week, tenure 30 weeks, average value 50
/// - `C`: a single purchase
pub fn scenario_customers() -> Vec<CustomerRecord> {
    let analysis = scenario_analysis_date();
    let a_first = analysis - Duration::weeks(20);
    let b_first = analysis - Duration::weeks(30);
    let c_first = analysis - Duration::weeks(8);

    vec![
        customer("A", a_first, a_first + Duration::weeks(10), 3.0, 2.0, 300.0, 200.0),
        customer("B", b_first, b_first + Duration::weeks(1), 1.0, 1.0, 60.0, 40.0),
        customer("C", c_first, c_first, 1.0, 0.0, 30.0, 0.0),
    ]
}

/// Deterministic population of `n` repeat customers with varied behaviour.
///
/// Every customer has between 2 and 9 purchases and its last purchase falls
/// before 2021-06-01.
pub fn synthetic_customers(n: usize) -> Vec<CustomerRecord> {
    let reference = date(2021, 6, 1);
    (0..n)
        .map(|i| {
            let orders_online = ((i * 7) % 5 + 1) as f64;
            let orders_offline = ((i * 3) % 4 + 1) as f64;
            let tenure_days = (140 + (i * 37) % 420) as i64;
            let recency_days = tenure_days * ((i * 11) % 10) as i64 / 10;
            let value_online = (40 + (i * 53) % 300) as f64;
            let value_offline = (20 + (i * 29) % 150) as f64;

            let first = reference - Duration::days(tenure_days);
            customer(
                &format!("cust_{:04}", i),
                first,
                first + Duration::days(recency_days),
                orders_online,
                orders_offline,
                value_online,
                value_offline,
            )
        })
        .collect()
}

fn format_date(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format("%Y-%m-%d").to_string())
}

/// Render customer records in the raw input schema
pub fn customers_to_dataframe(records: &[CustomerRecord]) -> DataFrame {
    df! {
        "master_id" => records.iter().map(|r| r.master_id.clone()).collect::<Vec<_>>(),
        "order_channel" => records.iter().map(|r| r.order_channel.clone()).collect::<Vec<_>>(),
        "last_order_channel" => records.iter().map(|r| r.last_order_channel.clone()).collect::<Vec<_>>(),
        "first_order_date" => records.iter().map(|r| r.first_order_date.format("%Y-%m-%d").to_string()).collect::<Vec<_>>(),
        "last_order_date" => records.iter().map(|r| r.last_order_date.format("%Y-%m-%d").to_string()).collect::<Vec<_>>(),
        "last_order_date_online" => records.iter().map(|r| format_date(r.last_order_date_online)).collect::<Vec<_>>(),
        "last_order_date_offline" => records.iter().map(|r| format_date(r.last_order_date_offline)).collect::<Vec<_>>(),
        "order_num_total_ever_online" => records.iter().map(|r| r.order_num_total_ever_online).collect::<Vec<_>>(),
        "order_num_total_ever_offline" => records.iter().map(|r| r.order_num_total_ever_offline).collect::<Vec<_>>(),
        "customer_value_total_ever_offline" => records.iter().map(|r| r.customer_value_total_ever_offline).collect::<Vec<_>>(),
        "customer_value_total_ever_online" => records.iter().map(|r| r.customer_value_total_ever_online).collect::<Vec<_>>(),
        "interested_in_categories_12" => records.iter().map(|r| format!("[{}]", r.interested_in_categories.join(", "))).collect::<Vec<_>>(),
    }
    .unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("customers.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("customers.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}

//! Customer table loading (CSV or Parquet) and forecast table assembly

use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

use super::error::{CltvError, Result};
use super::records::{CustomerRecord, ForecastRecord, VolumeColumn};
use crate::utils::{create_spinner, finish_with_success};

/// Columns every input table must carry
pub const REQUIRED_COLUMNS: [&str; 12] = [
    "master_id",
    "order_channel",
    "last_order_channel",
    "first_order_date",
    "last_order_date",
    "last_order_date_online",
    "last_order_date_offline",
    "order_num_total_ever_online",
    "order_num_total_ever_offline",
    "customer_value_total_ever_offline",
    "customer_value_total_ever_online",
    "interested_in_categories_12",
];

/// Column order of the forecast table
pub const OUTPUT_COLUMNS: [&str; 10] = [
    "customer_id",
    "recency_cltv_weekly",
    "T_weekly",
    "frequency",
    "monetary_cltv_avg",
    "exp_sales_3_month",
    "exp_sales_6_month",
    "exp_average_value",
    "cltv",
    "segment",
];

/// Load a dataset from a file (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> anyhow::Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    // 0 means full table scan
    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(schema_length)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    lf.collect()
        .with_context(|| format!("Failed to read dataset: {}", path.display()))
}

/// Load a dataset behind a spinner, returning the frame with its row count,
/// column count and estimated size in MB.
pub fn load_dataset_with_progress(
    path: &Path,
    infer_schema_length: usize,
) -> anyhow::Result<(DataFrame, usize, usize, f64)> {
    let spinner = create_spinner(&format!("Reading {}...", path.display()));
    let df = load_dataset(path, infer_schema_length)?;
    let (rows, cols) = df.shape();
    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);
    finish_with_success(&spinner, &format!("Loaded {} rows", rows));
    Ok((df, rows, cols, memory_mb))
}

/// Check that every required column is present.
pub fn validate_schema(df: &DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for required in REQUIRED_COLUMNS {
        if !names.iter().any(|n| n == required) {
            return Err(CltvError::MissingColumn {
                column: required.to_string(),
            });
        }
    }
    Ok(())
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name).map_err(|_| CltvError::MissingColumn {
        column: name.to_string(),
    })?;
    let cast = column
        .cast(&DataType::String)
        .map_err(|e| CltvError::InvalidColumn {
            column: name.to_string(),
            message: e.to_string(),
        })?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name).map_err(|_| CltvError::MissingColumn {
        column: name.to_string(),
    })?;
    if !column.dtype().is_primitive_numeric() {
        return Err(CltvError::InvalidColumn {
            column: name.to_string(),
            message: format!("expected a numeric column, found {}", column.dtype()),
        });
    }
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Parse `YYYY-MM-DD`, optionally followed by a time of day which is ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Split a category list such as `[KADIN, ERKEK]` into its entries.
pub fn parse_categories(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|s| s.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn required_date(value: Option<&str>, column: &str, customer_id: &str) -> Result<NaiveDate> {
    let raw = value.ok_or_else(|| CltvError::invalid_value(column, customer_id, "missing date"))?;
    parse_date(raw).ok_or_else(|| {
        CltvError::invalid_value(column, customer_id, format!("unparseable date '{}'", raw))
    })
}

fn optional_date(value: Option<&str>, column: &str, customer_id: &str) -> Result<Option<NaiveDate>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_date(raw).map(Some).ok_or_else(|| {
            CltvError::invalid_value(column, customer_id, format!("unparseable date '{}'", raw))
        }),
    }
}

/// Convert the raw table into validated customer records.
pub fn records_from_dataframe(df: &DataFrame) -> Result<Vec<CustomerRecord>> {
    validate_schema(df)?;

    let ids = string_column(df, "master_id")?;
    let channels = string_column(df, "order_channel")?;
    let last_channels = string_column(df, "last_order_channel")?;
    let first_dates = string_column(df, "first_order_date")?;
    let last_dates = string_column(df, "last_order_date")?;
    let last_online = string_column(df, "last_order_date_online")?;
    let last_offline = string_column(df, "last_order_date_offline")?;
    let categories = string_column(df, "interested_in_categories_12")?;

    let mut volumes = Vec::with_capacity(VolumeColumn::ALL.len());
    for column in VolumeColumn::ALL {
        volumes.push((column, float_column(df, column.name())?));
    }

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let master_id = ids[row]
            .clone()
            .ok_or_else(|| CltvError::invalid_value("master_id", &format!("row {}", row), "missing id"))?;

        let mut record = CustomerRecord {
            order_channel: channels[row].clone().unwrap_or_default(),
            last_order_channel: last_channels[row].clone().unwrap_or_default(),
            first_order_date: required_date(first_dates[row].as_deref(), "first_order_date", &master_id)?,
            last_order_date: required_date(last_dates[row].as_deref(), "last_order_date", &master_id)?,
            last_order_date_online: optional_date(last_online[row].as_deref(), "last_order_date_online", &master_id)?,
            last_order_date_offline: optional_date(last_offline[row].as_deref(), "last_order_date_offline", &master_id)?,
            order_num_total_ever_online: 0.0,
            order_num_total_ever_offline: 0.0,
            customer_value_total_ever_offline: 0.0,
            customer_value_total_ever_online: 0.0,
            interested_in_categories: categories[row]
                .as_deref()
                .map(parse_categories)
                .unwrap_or_default(),
            master_id,
        };

        for (column, values) in &volumes {
            let value = values[row].ok_or_else(|| {
                CltvError::invalid_value(column.name(), &record.master_id, "missing value")
            })?;
            if !value.is_finite() || value < 0.0 {
                return Err(CltvError::invalid_value(
                    column.name(),
                    &record.master_id,
                    format!("{} is not a non-negative number", value),
                ));
            }
            column.set(&mut record, value);
        }

        records.push(record);
    }

    Ok(records)
}

/// Assemble the forecast table in its published column order.
pub fn forecasts_to_dataframe(forecasts: &[ForecastRecord]) -> Result<DataFrame> {
    let columns = vec![
        Column::new(
            OUTPUT_COLUMNS[0].into(),
            forecasts.iter().map(|f| f.customer_id.clone()).collect::<Vec<String>>(),
        ),
        Column::new(
            OUTPUT_COLUMNS[1].into(),
            forecasts.iter().map(|f| f.recency_cltv_weekly).collect::<Vec<f64>>(),
        ),
        Column::new(
            OUTPUT_COLUMNS[2].into(),
            forecasts.iter().map(|f| f.t_weekly).collect::<Vec<f64>>(),
        ),
        Column::new(
            OUTPUT_COLUMNS[3].into(),
            forecasts.iter().map(|f| f.frequency).collect::<Vec<u32>>(),
        ),
        Column::new(
            OUTPUT_COLUMNS[4].into(),
            forecasts.iter().map(|f| f.monetary_cltv_avg).collect::<Vec<f64>>(),
        ),
        Column::new(
            OUTPUT_COLUMNS[5].into(),
            forecasts.iter().map(|f| f.exp_sales_3_month).collect::<Vec<f64>>(),
        ),
        Column::new(
            OUTPUT_COLUMNS[6].into(),
            forecasts.iter().map(|f| f.exp_sales_6_month).collect::<Vec<f64>>(),
        ),
        Column::new(
            OUTPUT_COLUMNS[7].into(),
            forecasts.iter().map(|f| f.exp_average_value).collect::<Vec<f64>>(),
        ),
        Column::new(
            OUTPUT_COLUMNS[8].into(),
            forecasts.iter().map(|f| f.cltv).collect::<Vec<f64>>(),
        ),
        Column::new(
            OUTPUT_COLUMNS[9].into(),
            forecasts
                .iter()
                .map(|f| f.segment.display_label())
                .collect::<Vec<&str>>(),
        ),
    ];
    Ok(DataFrame::new(columns)?)
}

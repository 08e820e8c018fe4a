//! Run summary and input profile tables

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;

use crate::pipeline::{quantile_sorted, CappingOutcome, CustomerRecord, VolumeColumn};

/// Counts and timings collected while the pipeline runs
#[derive(Debug, Default)]
pub struct RunSummary {
    pub customers_loaded: usize,
    pub values_capped: usize,
    pub customers_excluded: usize,
    pub customers_scored: usize,
    pub total_cltv: f64,
    pub load_time: Duration,
    pub capping_time: Duration,
    pub feature_time: Duration,
    pub fit_time: Duration,
    pub scoring_time: Duration,
    pub save_time: Duration,
}

impl RunSummary {
    pub fn new(customers_loaded: usize) -> Self {
        Self {
            customers_loaded,
            ..Default::default()
        }
    }

    pub fn set_capping(&mut self, outcome: &CappingOutcome) {
        self.values_capped = outcome.total_replaced();
    }

    pub fn total_time(&self) -> Duration {
        self.load_time
            + self.capping_time
            + self.feature_time
            + self.fit_time
            + self.scoring_time
            + self.save_time
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("RUN SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![
            Cell::new("📁 Customers Loaded"),
            Cell::new(self.customers_loaded),
        ]);
        table.add_row(vec![
            Cell::new("✂️  Values Capped"),
            Cell::new(self.values_capped).fg(if self.values_capped == 0 {
                Color::White
            } else {
                Color::Yellow
            }),
        ]);
        table.add_row(vec![
            Cell::new("🚫 Excluded (≤1 purchase)"),
            Cell::new(self.customers_excluded).fg(if self.customers_excluded == 0 {
                Color::White
            } else {
                Color::Red
            }),
        ]);
        table.add_row(vec![
            Cell::new("✅ Customers Scored"),
            Cell::new(self.customers_scored)
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("💰 Total CLTV"),
            Cell::new(format!("{:.2}", self.total_cltv))
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("⏱  Total Time"),
            Cell::new(format!("{:.2}s", self.total_time().as_secs_f64())),
        ]);

        for line in table.to_string().lines() {
            println!("    {}", line);
        }
    }
}

/// Descriptive statistics for one numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: &'static str,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q01: f64,
    pub median: f64,
    pub q99: f64,
    pub max: f64,
}

impl ColumnProfile {
    pub fn from_values(name: &'static str, values: &[f64]) -> Self {
        let count = values.len();
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = if count > 0 {
            values.iter().sum::<f64>() / count as f64
        } else {
            f64::NAN
        };
        // Sample standard deviation
        let std = if count > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        Self {
            name,
            count,
            mean,
            std,
            min: sorted.first().copied().unwrap_or(f64::NAN),
            q01: quantile_sorted(&sorted, 0.01),
            median: quantile_sorted(&sorted, 0.5),
            q99: quantile_sorted(&sorted, 0.99),
            max: sorted.last().copied().unwrap_or(f64::NAN),
        }
    }
}

/// Profile the four volume/spend columns of a customer table
pub fn profile_volume_columns(records: &[CustomerRecord]) -> Vec<ColumnProfile> {
    VolumeColumn::ALL
        .iter()
        .map(|column| {
            let values: Vec<f64> = records.iter().map(|r| column.get(r)).collect();
            ColumnProfile::from_values(column.name(), &values)
        })
        .collect()
}

/// Print a describe-style table for the given profiles
pub fn display_profiles(title: &str, profiles: &[ColumnProfile]) {
    println!();
    println!("    {} {}", style("✧").cyan(), style(title).white().bold());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        ["Column", "Count", "Mean", "Std", "Min", "1%", "50%", "99%", "Max"]
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );

    for p in profiles {
        let mut row = vec![Cell::new(p.name), Cell::new(p.count)];
        for value in [p.mean, p.std, p.min, p.q01, p.median, p.q99, p.max] {
            row.push(Cell::new(format!("{:.4}", value)).set_alignment(CellAlignment::Right));
        }
        table.add_row(row);
    }

    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

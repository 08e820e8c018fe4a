//! Segment profiles and top-customer listing

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;
use serde::Serialize;

use crate::pipeline::{ForecastRecord, SegmentLabel};

/// Aggregates for one value segment
#[derive(Debug, Clone, Serialize)]
pub struct SegmentProfile {
    pub segment: String,
    pub count: usize,
    pub cltv_sum: f64,
    pub cltv_mean: f64,
    pub frequency_mean: f64,
    pub recency_mean: f64,
    pub tenure_mean: f64,
    pub monetary_mean: f64,
    pub exp_sales_6_month_mean: f64,
    pub exp_average_value_mean: f64,
}

/// Profile every populated segment, highest segment first
pub fn profile_segments(forecasts: &[ForecastRecord]) -> Vec<SegmentProfile> {
    SegmentLabel::ORDERED
        .iter()
        .rev()
        .filter_map(|&label| {
            let members: Vec<&ForecastRecord> =
                forecasts.iter().filter(|f| f.segment == label).collect();
            if members.is_empty() {
                return None;
            }
            let n = members.len() as f64;
            let mean = |g: fn(&ForecastRecord) -> f64| members.iter().map(|f| g(f)).sum::<f64>() / n;
            let cltv_sum: f64 = members.iter().map(|f| f.cltv).sum();

            Some(SegmentProfile {
                segment: label.display_label().to_string(),
                count: members.len(),
                cltv_sum,
                cltv_mean: cltv_sum / n,
                frequency_mean: mean(|f| f.frequency as f64),
                recency_mean: mean(|f| f.recency_cltv_weekly),
                tenure_mean: mean(|f| f.t_weekly),
                monetary_mean: mean(|f| f.monetary_cltv_avg),
                exp_sales_6_month_mean: mean(|f| f.exp_sales_6_month),
                exp_average_value_mean: mean(|f| f.exp_average_value),
            })
        })
        .collect()
}

/// The `n` customers with the highest CLTV, highest first
pub fn top_customers(forecasts: &[ForecastRecord], n: usize) -> Vec<&ForecastRecord> {
    let mut ranked: Vec<&ForecastRecord> = forecasts.iter().collect();
    ranked.sort_by(|a, b| b.cltv.total_cmp(&a.cltv));
    ranked.truncate(n);
    ranked
}

fn segment_color(segment: &str) -> Color {
    match segment {
        "A" => Color::Green,
        "B" => Color::Cyan,
        "C" => Color::Yellow,
        _ => Color::Red,
    }
}

fn number(value: f64) -> Cell {
    Cell::new(format!("{:.2}", value)).set_alignment(CellAlignment::Right)
}

/// Print the segment profile table
pub fn display_segment_profiles(profiles: &[SegmentProfile]) {
    println!();
    println!(
        "    {} {}",
        style("📊").cyan(),
        style("SEGMENT PROFILES").white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        [
            "Segment", "Count", "CLTV Sum", "CLTV Mean", "Frequency", "Recency", "Tenure",
            "Monetary", "Exp Sales 6M", "Exp Avg Value",
        ]
        .iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );

    for p in profiles {
        table.add_row(vec![
            Cell::new(&p.segment)
                .fg(segment_color(&p.segment))
                .add_attribute(Attribute::Bold),
            Cell::new(p.count),
            number(p.cltv_sum),
            number(p.cltv_mean),
            number(p.frequency_mean),
            number(p.recency_mean),
            number(p.tenure_mean),
            number(p.monetary_mean),
            number(p.exp_sales_6_month_mean),
            number(p.exp_average_value_mean),
        ]);
    }

    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

/// Print the highest-value customers
pub fn display_top_customers(top: &[&ForecastRecord]) {
    println!();
    println!(
        "    {} {}",
        style("🏆").cyan(),
        style(format!("TOP {} CUSTOMERS BY CLTV", top.len())).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        ["Customer", "Frequency", "Exp Sales 3M", "Exp Sales 6M", "Exp Avg Value", "CLTV", "Segment"]
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );

    for f in top {
        let label = f.segment.display_label();
        table.add_row(vec![
            Cell::new(&f.customer_id),
            Cell::new(f.frequency),
            number(f.exp_sales_3_month),
            number(f.exp_sales_6_month),
            number(f.exp_average_value),
            number(f.cltv),
            Cell::new(label).fg(segment_color(label)),
        ]);
    }

    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

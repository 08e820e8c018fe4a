//! Row types flowing between pipeline stages

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One customer's historical aggregates, as delivered by the data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub master_id: String,
    pub order_channel: String,
    pub last_order_channel: String,
    pub first_order_date: NaiveDate,
    pub last_order_date: NaiveDate,
    pub last_order_date_online: Option<NaiveDate>,
    pub last_order_date_offline: Option<NaiveDate>,
    pub order_num_total_ever_online: f64,
    pub order_num_total_ever_offline: f64,
    pub customer_value_total_ever_offline: f64,
    pub customer_value_total_ever_online: f64,
    pub interested_in_categories: Vec<String>,
}

impl CustomerRecord {
    /// Total orders across both channels
    pub fn order_num_total(&self) -> f64 {
        self.order_num_total_ever_offline + self.order_num_total_ever_online
    }

    /// Total spend across both channels
    pub fn customer_value_total(&self) -> f64 {
        self.customer_value_total_ever_offline + self.customer_value_total_ever_online
    }
}

/// The four volume/spend columns subject to outlier capping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeColumn {
    OrdersOnline,
    OrdersOffline,
    ValueOffline,
    ValueOnline,
}

impl VolumeColumn {
    pub const ALL: [VolumeColumn; 4] = [
        VolumeColumn::OrdersOnline,
        VolumeColumn::OrdersOffline,
        VolumeColumn::ValueOffline,
        VolumeColumn::ValueOnline,
    ];

    /// Column name in the source table
    pub fn name(&self) -> &'static str {
        match self {
            VolumeColumn::OrdersOnline => "order_num_total_ever_online",
            VolumeColumn::OrdersOffline => "order_num_total_ever_offline",
            VolumeColumn::ValueOffline => "customer_value_total_ever_offline",
            VolumeColumn::ValueOnline => "customer_value_total_ever_online",
        }
    }

    pub fn get(&self, record: &CustomerRecord) -> f64 {
        match self {
            VolumeColumn::OrdersOnline => record.order_num_total_ever_online,
            VolumeColumn::OrdersOffline => record.order_num_total_ever_offline,
            VolumeColumn::ValueOffline => record.customer_value_total_ever_offline,
            VolumeColumn::ValueOnline => record.customer_value_total_ever_online,
        }
    }

    pub fn set(&self, record: &mut CustomerRecord, value: f64) {
        match self {
            VolumeColumn::OrdersOnline => record.order_num_total_ever_online = value,
            VolumeColumn::OrdersOffline => record.order_num_total_ever_offline = value,
            VolumeColumn::ValueOffline => record.customer_value_total_ever_offline = value,
            VolumeColumn::ValueOnline => record.customer_value_total_ever_online = value,
        }
    }
}

/// Per-customer RFM-style features in weekly units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub customer_id: String,
    /// Weeks between first and last purchase
    pub recency_weeks: f64,
    /// Weeks between first purchase and the analysis date
    pub tenure_weeks: f64,
    /// Total purchases across channels, always >= 2
    pub frequency: u32,
    /// Total spend divided by frequency, always > 0
    pub avg_monetary: f64,
}

/// Ordinal value segment, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SegmentLabel {
    Lowest,
    Low,
    High,
    Highest,
}

impl SegmentLabel {
    pub const ORDERED: [SegmentLabel; 4] = [
        SegmentLabel::Lowest,
        SegmentLabel::Low,
        SegmentLabel::High,
        SegmentLabel::Highest,
    ];

    /// Label for bucket `rank` (0 = lowest) out of `buckets`.
    ///
    /// The highest bucket is always `Highest`; with fewer than four buckets
    /// the lower labels go unused.
    pub fn from_rank(rank: usize, buckets: usize) -> Option<SegmentLabel> {
        if buckets == 0 || buckets > Self::ORDERED.len() || rank >= buckets {
            return None;
        }
        Some(Self::ORDERED[Self::ORDERED.len() - buckets + rank])
    }

    /// Letter used in reports: D (lowest) through A (highest)
    pub fn display_label(&self) -> &'static str {
        match self {
            SegmentLabel::Lowest => "D",
            SegmentLabel::Low => "C",
            SegmentLabel::High => "B",
            SegmentLabel::Highest => "A",
        }
    }
}

impl std::fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_label())
    }
}

/// Final per-customer output row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRecord {
    pub customer_id: String,
    pub recency_cltv_weekly: f64,
    pub t_weekly: f64,
    pub frequency: u32,
    pub monetary_cltv_avg: f64,
    pub exp_sales_3_month: f64,
    pub exp_sales_6_month: f64,
    pub exp_average_value: f64,
    pub cltv: f64,
    pub segment: SegmentLabel,
}

//! Typed model of the summary feed payload.
//!
//! Validation is deliberately strict and deep: unknown fields and structural
//! drift anywhere in the payload fail the whole parse, converting silent
//! downstream corruption into an early, alertable failure.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::error::SyncError;

/// Parse and validate a raw summary payload against the feed contract.
pub fn parse_summary(raw: &str) -> Result<Summary, SyncError> {
    serde_json::from_str(raw).map_err(|e| SyncError::schema_mismatch(e.to_string()))
}

/// Top-level container of the summary feed. The three data points (tropical
/// weather outlook, storm track entries, recon mission plans) are separated,
/// each carrying its own change counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Summary {
    pub two: Section<TwoSummary>,
    pub atcf: Section<Vec<AtcfStorm>>,
    pub tcpod: Section<TcpodSummary>,
}

/// One data point of the summary feed plus its derived change counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Section<T> {
    pub data: T,
    pub last_modified: Option<i64>,
    pub count: u32,
}

// ---- common WMO pieces ----

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WmoDate {
    pub iso: String,
    pub time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WmoDateRange {
    pub start: Option<WmoDate>,
    pub end: Option<WmoDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WmoCoordinates {
    pub lat: f64,
    pub lon: f64,
}

// ---- tropical weather outlook (TWO) ----

pub type ShapeCoordinates = (f64, f64);

/// Coordinate payload of an outlook shape: a point, a line, or a polygon set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateSet {
    Point(ShapeCoordinates),
    Line(Vec<ShapeCoordinates>),
    Polygon(Vec<Vec<ShapeCoordinates>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShapeGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub bbox: Option<(f64, f64, f64, f64)>,
    pub coordinates: Option<CoordinateSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShapeFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Option<ShapeGeometry>,
    pub properties: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormationChance {
    pub level: String,
    pub chance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TwoAreaOfInterest {
    pub title: Option<String>,
    pub id: Option<String>,
    pub text: Option<String>,
    pub two_day: Option<FormationChance>,
    pub seven_day: Option<FormationChance>,
    pub features: Option<Vec<ShapeFeature>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TwoBasin {
    pub issued_by: String,
    pub issued_on: Option<WmoDate>,
    #[serde(rename = "for")]
    pub valid_for: String,
    pub active: Option<String>,
    pub areas: Vec<TwoAreaOfInterest>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwoBasins {
    pub atlantic: TwoBasin,
    pub pacific: TwoBasin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwoSummary {
    pub basins: TwoBasins,
}

// ---- storm track entries (ATCF) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtcfWindRadii {
    pub rad: Option<f64>,
    pub code: Option<String>,
    pub ne: Option<f64>,
    pub se: Option<f64>,
    pub sw: Option<f64>,
    pub nw: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtcfStormCode {
    pub ba: Option<String>,
    pub id: Option<String>,
    pub yr: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtcfTransition {
    pub from: AtcfStormCode,
    pub to: AtcfStormCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AtcfTrackEntry {
    pub basin: Option<String>,
    pub storm_no: Option<i32>,
    pub date: Option<String>,
    pub tech_num: Option<String>,
    pub tech: Option<String>,
    pub tau: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub max_sus_wind: Option<f64>,
    pub min_sea_level_psur: Option<f64>,
    pub level_code: Option<String>,
    pub level: Option<String>,
    pub wind_rad: Option<AtcfWindRadii>,
    pub outer_psur: Option<f64>,
    pub outer_rad: Option<f64>,
    pub max_wind_rad: Option<f64>,
    pub wind_gust: Option<f64>,
    pub eye_dia: Option<f64>,
    pub sub_region: Option<String>,
    pub max_seas: Option<f64>,
    pub forecaster: Option<String>,
    pub dir: Option<f64>,
    pub speed: Option<f64>,
    pub name: Option<String>,
    pub depth: Option<String>,
    pub sea_rad: Option<AtcfWindRadii>,
    pub user_data: HashMap<String, String>,
    pub gen_no: Option<i32>,
    pub invest: Option<AtcfTransition>,
    pub trans: Option<AtcfTransition>,
    pub diss: Option<AtcfTransition>,
}

/// One tracked storm: its track entries plus identity transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AtcfStorm {
    pub data: Vec<AtcfTrackEntry>,
    pub gen_no: Option<i32>,
    pub invest: Option<AtcfTransition>,
    pub trans: Option<AtcfTransition>,
    pub diss: Option<AtcfTransition>,
}

// ---- recon mission plans (TCPOD / NOUS42) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Nous42HeaderTcpod {
    pub full: Option<String>,
    pub tc: bool,
    pub yr: Option<String>,
    pub seq: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Nous42Header {
    pub awips: Option<String>,
    pub issued: Option<WmoDate>,
    pub start: Option<WmoDate>,
    pub end: Option<WmoDate>,
    pub tcpod: Option<Nous42HeaderTcpod>,
    pub correction: Option<bool>,
    pub amendment: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Nous42Outlook {
    pub negative: bool,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Nous42Canceled {
    pub tcpod: Option<String>,
    #[serde(default)]
    pub mission: Option<String>,
    #[serde(default)]
    pub tcpod_yr: Option<String>,
    #[serde(default)]
    pub tcpod_seq: Option<String>,
    #[serde(default)]
    pub required: Option<WmoDateRange>,
    #[serde(default)]
    pub canceled_at: Option<WmoDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Nous42Altitude {
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Nous42Mission {
    pub tcpod: Option<Nous42HeaderTcpod>,
    pub name: Option<String>,
    pub required: Option<WmoDateRange>,
    pub id: Option<String>,
    pub departure: Option<WmoDate>,
    pub coordinates: Option<WmoCoordinates>,
    pub window: Option<WmoDateRange>,
    pub altitude: Option<Nous42Altitude>,
    pub profile: Option<String>,
    pub wra: Option<bool>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Nous42Storm {
    pub name: Option<String>,
    pub text: Option<String>,
    pub missions: Vec<Nous42Mission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Nous42Basin {
    pub storms: Vec<Nous42Storm>,
    pub outlook: Vec<Nous42Outlook>,
    pub remarks: Vec<String>,
    pub canceled: Vec<Nous42Canceled>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Nous42 {
    pub header: Option<Nous42Header>,
    pub atlantic: Option<Nous42Basin>,
    pub pacific: Option<Nous42Basin>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WmoHeaderSegment {
    pub major: Option<String>,
    pub minor: Option<String>,
    pub last: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WmoHeader {
    pub sequence: Option<i64>,
    pub designator: Option<String>,
    pub station: Option<String>,
    pub datetime: Option<WmoDate>,
    pub delay: Option<String>,
    pub correction: Option<String>,
    pub amendment: Option<String>,
    pub segment: Option<WmoHeaderSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpodDocument {
    pub header: WmoHeader,
    pub message: Nous42,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpodSummary {
    pub today: Option<TcpodDocument>,
    pub tomorrow: Option<TcpodDocument>,
}

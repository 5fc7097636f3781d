//! Flat JSON analytics documents kept next to the database.
//!
//! `search_stats.json` maps a product id to the number of catalog searches
//! that showed it. Updates read the whole document, bump counters and rewrite
//! it without locking, so concurrent writers can lose increments. That is
//! accepted: the numbers only feed the admin analytics page.
//!
//! `gender_map.json` is a legacy document from before products had a gender
//! column. It is only read, to backfill that column.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::Product;

pub const SEARCH_STATS_FILE: &str = "search_stats.json";
pub const GENDER_MAP_FILE: &str = "gender_map.json";
const CHART_SIZE: usize = 5;

#[derive(Clone, Debug)]
pub struct AnalyticsStore {
    dir: PathBuf,
}

impl AnalyticsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn search_stats_path(&self) -> PathBuf {
        self.dir.join(SEARCH_STATS_FILE)
    }

    fn gender_map_path(&self) -> PathBuf {
        self.dir.join(GENDER_MAP_FILE)
    }

    /// Entries are read one by one: integers, whole floats and numeric
    /// strings count; anything else is skipped so the rest survive the next
    /// rewrite.
    pub fn load_search_stats(&self) -> BTreeMap<String, u64> {
        let path = self.search_stats_path();
        let raw: BTreeMap<String, Value> = load_document(&path);
        raw.into_iter()
            .filter_map(|(key, value)| match search_count(&value) {
                Some(count) => Some((key, count)),
                None => {
                    warn!("Skipping search count {:?} for {} in {}", value, key, path.display());
                    None
                }
            })
            .collect()
    }

    pub fn save_search_stats(&self, stats: &BTreeMap<String, u64>) {
        save_document(&self.dir, &self.search_stats_path(), stats);
    }

    pub fn increment_search_counts(&self, product_ids: &[i32]) {
        if product_ids.is_empty() {
            return;
        }
        let mut stats = self.load_search_stats();
        for pid in product_ids {
            *stats.entry(pid.to_string()).or_insert(0) += 1;
        }
        self.save_search_stats(&stats);
        debug!("Search counts bumped for {} products", product_ids.len());
    }

    pub fn load_gender_map(&self) -> BTreeMap<String, String> {
        load_document(&self.gender_map_path())
    }
}

fn load_document<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Failed to parse {}: {}", path.display(), e);
        T::default()
    })
}

fn search_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// Written to a sibling temp file and renamed so a crash never leaves half a document
fn save_document<T: Serialize>(dir: &Path, path: &Path, value: &T) {
    let result = fs::create_dir_all(dir)
        .and_then(|_| serde_json::to_vec(value).map_err(std::io::Error::from))
        .and_then(|bytes| {
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, bytes)?;
            fs::rename(&tmp, path)
        });
    if let Err(e) = result {
        warn!("Failed to save {}: {}", path.display(), e);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AnalyticsRow {
    pub id: i32,
    pub name: String,
    pub searches: u64,
    pub favourites: i64,
}

#[derive(Serialize, Debug)]
pub struct AnalyticsReport {
    pub rows: Vec<AnalyticsRow>,
    pub chart_labels: Vec<String>,
    pub chart_data: Vec<u64>,
}

/// One row per product, most searched first, favourites breaking ties.
pub fn build_report(
    products: &[Product],
    search_stats: &BTreeMap<String, u64>,
    favourite_counts: &HashMap<i32, i64>,
) -> AnalyticsReport {
    let mut rows: Vec<AnalyticsRow> = products
        .iter()
        .map(|p| AnalyticsRow {
            id: p.id,
            name: p.name.clone(),
            searches: search_stats.get(&p.id.to_string()).copied().unwrap_or(0),
            favourites: favourite_counts.get(&p.id).copied().unwrap_or(0),
        })
        .collect();

    rows.sort_by(|a, b| {
        (b.searches, b.favourites)
            .cmp(&(a.searches, a.favourites))
            .then(a.id.cmp(&b.id))
    });

    let top = rows.iter().take(CHART_SIZE);
    let chart_labels = top.clone().map(|r| r.name.clone()).collect();
    let chart_data = top.map(|r| r.searches).collect();

    AnalyticsReport { rows, chart_labels, chart_data }
}

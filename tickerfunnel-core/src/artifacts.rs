//! Static JSON artifacts consumed by the web front-end.
//!
//! - `trie.json`: uppercase prefix → symbols whose ticker or company-name
//!   words start with that prefix.
//! - `metadata.json`: symbol → display fields plus the five percentile scores.
//!
//! Both are compact JSON, written to a temporary sibling and renamed into
//! place so a reader never observes a half-written file.

use crate::domain::{ScoringInput, StrategyScores};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const TRIE_FILE: &str = "trie.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Longest company-name word prefix indexed.
const MAX_WORD_PREFIX: usize = 5;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Prefix → symbols search index.
pub type PrefixIndex = BTreeMap<String, BTreeSet<String>>;

fn add_prefixes(index: &mut PrefixIndex, token: &str, max_len: usize, symbol: &str) {
    let mut prefix = String::new();
    for c in token.chars().take(max_len) {
        prefix.push(c);
        index
            .entry(prefix.clone())
            .or_default()
            .insert(symbol.to_string());
    }
}

/// Index every prefix of each symbol and up to five characters of every
/// word of its company name.
pub fn build_prefix_index<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> PrefixIndex {
    let mut index = PrefixIndex::new();
    for (symbol, name) in entries {
        let upper = symbol.to_uppercase();
        add_prefixes(&mut index, &upper, usize::MAX, symbol);

        for word in name.to_uppercase().split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if !word.is_empty() {
                add_prefixes(&mut index, word, MAX_WORD_PREFIX, symbol);
            }
        }
    }
    index
}

/// Display record for one symbol in `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerMetadata {
    pub name: String,
    pub exchange: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub price: f64,
    pub volume: i64,
    pub market_cap: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub rsi: Option<f64>,
    pub ma200: Option<f64>,
    pub ma50: Option<f64>,
    pub pe_ratio: Option<f64>,
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub week52_high: Option<f64>,
    pub week52_low: Option<f64>,
    #[serde(rename = "avgVolume10Day")]
    pub avg_volume_10day: Option<i64>,
    pub short_ratio: Option<f64>,
    pub short_percent_float: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub target_mean_price: Option<f64>,
    pub recommendation_mean: Option<f64>,
    pub num_analyst_opinions: Option<i64>,
    pub shares_outstanding: Option<i64>,
    pub float_shares: Option<i64>,
    pub scores: StrategyScores,
}

/// Symbol → display record.
pub type MetadataDoc = BTreeMap<String, TickerMetadata>;

fn round_to(v: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (v * factor).round() / factor
}

/// Fraction to percentage points, two decimals.
fn pct(v: Option<f64>) -> Option<f64> {
    v.map(|v| round_to(v * 100.0, 2))
}

fn dp(v: Option<f64>, places: i32) -> Option<f64> {
    v.map(|v| round_to(v, places))
}

impl TickerMetadata {
    pub fn new(input: &ScoringInput, scores: StrategyScores) -> Self {
        let f = &input.fundamentals;
        Self {
            name: input.name.clone(),
            exchange: input.exchange.clone(),
            sector: f.sector.clone(),
            industry: f.industry.clone(),
            price: round_to(input.price, 2),
            volume: input.volume,
            market_cap: f.market_cap,
            dividend_yield: pct(f.dividend_yield),
            beta: dp(f.beta, 2),
            rsi: dp(f.rsi_14, 1),
            ma200: dp(f.ma_200, 2),
            ma50: dp(f.ma_50, 2),
            pe_ratio: dp(f.pe_ratio, 2),
            forward_pe: dp(f.forward_pe, 2),
            price_to_book: dp(f.price_to_book, 2),
            peg_ratio: dp(f.peg_ratio, 2),
            enterprise_value: f.enterprise_value,
            week52_high: dp(f.week_52_high, 2),
            week52_low: dp(f.week_52_low, 2),
            avg_volume_10day: f.avg_volume_10day,
            short_ratio: dp(f.short_ratio, 2),
            short_percent_float: pct(f.short_percent_float),
            debt_to_equity: dp(f.debt_to_equity, 2),
            current_ratio: dp(f.current_ratio, 2),
            quick_ratio: dp(f.quick_ratio, 2),
            profit_margin: pct(f.profit_margin),
            operating_margin: pct(f.operating_margin),
            return_on_equity: pct(f.return_on_equity),
            return_on_assets: pct(f.return_on_assets),
            revenue_growth: pct(f.revenue_growth),
            earnings_growth: pct(f.earnings_growth),
            target_mean_price: dp(f.target_mean_price, 2),
            recommendation_mean: dp(f.recommendation_mean, 2),
            num_analyst_opinions: f.num_analyst_opinions,
            shares_outstanding: f.shares_outstanding,
            float_shares: f.float_shares,
            scores,
        }
    }
}

/// Build the metadata document from aligned inputs and scores.
pub fn build_metadata(inputs: &[ScoringInput], scores: &[StrategyScores]) -> MetadataDoc {
    inputs
        .iter()
        .zip(scores)
        .map(|(input, s)| (input.symbol.clone(), TickerMetadata::new(input, *s)))
        .collect()
}

/// What a build wrote to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSummary {
    pub trie_path: PathBuf,
    pub metadata_path: PathBuf,
    pub prefix_count: usize,
    pub symbol_count: usize,
    pub bytes_written: u64,
    /// BLAKE3 over both documents, trie first.
    pub content_hash: String,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `bytes` to `path` via a temporary sibling and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
    std::fs::rename(&tmp, path).map_err(io_err(path))
}

/// Serialize and write both artifacts into `dir`, creating it if needed.
pub fn write_artifacts(
    dir: &Path,
    index: &PrefixIndex,
    metadata: &MetadataDoc,
) -> Result<ArtifactSummary, ArtifactError> {
    std::fs::create_dir_all(dir).map_err(io_err(dir))?;

    let trie_bytes = serde_json::to_vec(index)?;
    let metadata_bytes = serde_json::to_vec(metadata)?;

    let trie_path = dir.join(TRIE_FILE);
    let metadata_path = dir.join(METADATA_FILE);
    write_atomic(&trie_path, &trie_bytes)?;
    write_atomic(&metadata_path, &metadata_bytes)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(&trie_bytes);
    hasher.update(&metadata_bytes);

    Ok(ArtifactSummary {
        trie_path,
        metadata_path,
        prefix_count: index.len(),
        symbol_count: metadata.len(),
        bytes_written: (trie_bytes.len() + metadata_bytes.len()) as u64,
        content_hash: hasher.finalize().to_hex().to_string(),
    })
}

/// True if both artifacts are present in `dir`.
pub fn artifacts_exist(dir: &Path) -> bool {
    dir.join(TRIE_FILE).is_file() && dir.join(METADATA_FILE).is_file()
}

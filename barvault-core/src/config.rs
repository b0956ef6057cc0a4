//! Collector configuration.
//!
//! One immutable `CollectorConfig` is loaded from TOML at startup and shared
//! by reference for the life of the process. Every field has a default, so a
//! file only needs the keys it overrides.

use crate::domain::Timeframe;
use crate::indicators::IndicatorParams;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which data source to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub timeout_secs: u64,
    /// Instrument name → provider ticker, for names the exchange suffix rule
    /// cannot express (indices).
    pub aliases: BTreeMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Yahoo,
            timeout_secs: 30,
            aliases: BTreeMap::new(),
        }
    }
}

/// A named partition of the universe with its own storage directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    pub name: String,
    /// Shown in completion tokens (`✅ {label} {instrument}`).
    pub label: String,
    /// Directory under `root_dir`.
    pub dir: String,
    pub timeframes: Vec<Timeframe>,
    pub instruments: Vec<String>,
    /// Compute indicator columns before persisting.
    #[serde(default = "default_enrich")]
    pub enrich: bool,
}

fn default_enrich() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub name: String,
    /// Target cadence of continuous mode.
    pub interval_secs: u64,
    pub max_workers: usize,
    /// Rows retained per series.
    pub window: usize,
    pub exchange: String,
    pub root_dir: PathBuf,
    /// Append-only failure log.
    pub log_file: PathBuf,
    /// Recompute indicators over the merged window instead of keeping the
    /// values computed at fetch time.
    pub recompute_on_merge: bool,
    pub shuffle_seed: Option<u64>,
    pub indicators: IndicatorParams,
    pub provider: ProviderConfig,
    pub buckets: Vec<BucketConfig>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self::default_fno()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl CollectorConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Number of (instrument, bucket) jobs per cycle.
    pub fn job_count(&self) -> usize {
        self.buckets.iter().map(|b| b.instruments.len()).sum()
    }

    pub fn bucket(&self, name: &str) -> Option<&BucketConfig> {
        self.buckets.iter().find(|b| b.name == name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.window == 0 {
            return invalid("window must be at least 1".into());
        }
        if self.max_workers == 0 {
            return invalid("max_workers must be at least 1".into());
        }
        if self.exchange.trim().is_empty() {
            return invalid("exchange must not be empty".into());
        }
        if self.indicators.rsi_period == 0 || self.indicators.bb_period == 0 {
            return invalid("indicator periods must be at least 1".into());
        }

        let mut names = HashSet::new();
        let mut dirs = HashSet::new();
        for bucket in &self.buckets {
            if !names.insert(bucket.name.as_str()) {
                return invalid(format!("duplicate bucket name '{}'", bucket.name));
            }
            if !dirs.insert(bucket.dir.as_str()) {
                return invalid(format!("duplicate bucket dir '{}'", bucket.dir));
            }
            if bucket.timeframes.is_empty() {
                return invalid(format!("bucket '{}' has no timeframes", bucket.name));
            }
            let mut seen = HashSet::new();
            for instrument in &bucket.instruments {
                if !seen.insert(instrument.as_str()) {
                    return invalid(format!(
                        "bucket '{}' lists '{instrument}' twice",
                        bucket.name
                    ));
                }
            }
        }

        Ok(())
    }

    /// Create `{root_dir}/{dir}/{timeframe}` for every bucket.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for bucket in &self.buckets {
            for tf in &bucket.timeframes {
                let path = self.root_dir.join(&bucket.dir).join(tf.label());
                std::fs::create_dir_all(&path)
                    .map_err(|source| ConfigError::CreateDir { path, source })?;
            }
        }
        Ok(())
    }

    /// F&O stock universe on all seven timeframes.
    pub fn default_fno() -> Self {
        Self {
            name: "FNO".into(),
            interval_secs: 3,
            max_workers: 12,
            window: 300,
            exchange: "NSE".into(),
            root_dir: PathBuf::from("market_data"),
            log_file: PathBuf::from("fno_collector.log"),
            recompute_on_merge: false,
            shuffle_seed: None,
            indicators: IndicatorParams::default(),
            provider: ProviderConfig::default(),
            buckets: vec![BucketConfig {
                name: "fno".into(),
                label: "FNO".into(),
                dir: "fno".into(),
                timeframes: Timeframe::ALL.to_vec(),
                instruments: strings(&[
                    "AMBER", "AMBUJACEM", "ANGELONE", "APLAPOLLO", "APOLLOHOSP", "ASHOKLEY",
                    "ASIANPAINT", "ASTRAL", "AUBANK", "AUROPHARMA", "AXISBANK", "BAJAJ_AUTO",
                    "BAJAJFINSV", "BAJFINANCE", "BANDHANBNK", "BANKBARODA", "BANKINDIA",
                    "PPLPHARMA", "PRESTIGE", "RBLBANK", "RECLTD", "RELIANCE", "RVNL", "SAIL",
                    "SAMMAANCAP", "SBICARD", "SBILIFE", "SBIN", "SHREECEM", "SHRIRAMFIN",
                    "SIEMENS", "SOLARINDS", "SONACOMS", "SRF", "SUNPHARMA", "SUPREMEIND",
                    "SUZLON",
                ]),
                enrich: true,
            }],
        }
    }

    /// Broad-market and sector indices on daily, weekly, and monthly bars,
    /// stored without indicator columns.
    pub fn default_indices() -> Self {
        let timeframes = vec![Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly];
        let aliases = [
            ("NIFTY", "^NSEI"),
            ("BANKNIFTY", "^NSEBANK"),
            ("CNXMIDCAP", "^NSEMDCP50"),
            ("CNXSMALLCAP", "^CNXSC"),
            ("CNX500", "^CRSLDX"),
            ("CNXFINANCE", "NIFTY_FIN_SERVICE.NS"),
            ("NIFTYJR", "^NSMIDCP"),
            ("CNX100", "^CNX100"),
            ("CNXREALTY", "^CNXREALTY"),
            ("CNXPSUBANK", "^CNXPSUBANK"),
            ("CNXMETAL", "^CNXMETAL"),
            ("CNXIT", "^CNXIT"),
            ("CNXSERVICE", "^CNXSERVICE"),
            ("CNXPSE", "^CNXPSE"),
            ("CNXCONSUMPTION", "^CNXCONSUM"),
            ("CNXINFRA", "^CNXINFRA"),
            ("CNXENERGY", "^CNXENERGY"),
            ("CNXAUTO", "^CNXAUTO"),
            ("CNXFMCG", "^CNXFMCG"),
            ("CNXPHARMA", "^CNXPHARMA"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            name: "Index".into(),
            max_workers: 6,
            log_file: PathBuf::from("indices_collector.log"),
            provider: ProviderConfig {
                aliases,
                ..ProviderConfig::default()
            },
            buckets: vec![
                BucketConfig {
                    name: "broader_index".into(),
                    label: "INDEX".into(),
                    dir: "broader_index".into(),
                    timeframes: timeframes.clone(),
                    instruments: strings(&[
                        "NIFTY", "BANKNIFTY", "CNXMIDCAP", "CNXSMALLCAP", "CNX500",
                        "CNXFINANCE", "NIFTYJR", "CNX100", "NIFTY_TOP_10_EW",
                    ]),
                    enrich: false,
                },
                BucketConfig {
                    name: "sector_index".into(),
                    label: "INDEX".into(),
                    dir: "sector_index".into(),
                    timeframes,
                    instruments: strings(&[
                        "CNXREALTY", "CNXPSUBANK", "CNXMETAL", "CNXIT", "CNXSERVICE", "CNXPSE",
                        "CNXCONSUMPTION", "CNXINFRA", "CNXENERGY", "CNXAUTO", "CNXFMCG",
                        "CNXPHARMA", "NIFTY_IND_DEFENCE", "NIFTY_CAPITAL_MKT", "NIFTYPVTBANK",
                        "NIFTY_INDIA_MFG", "NIFTY_OIL_AND_GAS", "NIFTY_HEALTHCARE",
                        "NIFTY_CHEMICALS", "NIFTY_CONSR_DURBL", "NIFTY_MS_IT_TELCM",
                    ]),
                    enrich: false,
                },
            ],
            ..Self::default_fno()
        }
    }
}

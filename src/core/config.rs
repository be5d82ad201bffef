use serde::Deserialize;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (schema-scout.json) merged over defaults
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "SCHEMA_SCOUT_CONFIG";

/// Result cache settings (mirrors the `cache` key in schema-scout.json).
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry lifetime in milliseconds.
    pub ttl: u64,
    pub max_size: usize,
    /// Only `"memory"` is implemented; anything else falls back to it.
    pub storage: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: 60 * 60 * 1000,
            max_size: 1000,
            storage: "memory".to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 10,
            window_ms: 1000,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationConfig {
    pub concurrency: usize,
    pub retry_on_fail: bool,
    pub max_retries: u32,
    pub use_cache: bool,
    /// Default batch deadline. `0` disables it.
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            retry_on_fail: true,
            max_retries: 3,
            use_cache: true,
            timeout_ms: 0,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResilienceConfig {
    /// Consecutive failures that open a domain's circuit.
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    /// First retry delay; attempt `n` waits `baseDelayMs × 2^n`.
    pub base_delay_ms: u64,
    pub jitter: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30_000,
            base_delay_ms: 200,
            jitter: true,
        }
    }
}

/// Heuristic knobs for type detection and content classification.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionConfig {
    /// Multiplier applied to caller-hinted types (result capped at 1.0).
    pub hint_boost: f64,
    /// Below this top score the `WebPage` fallback is prepended.
    pub min_confidence: f64,
    pub fallback_confidence: f64,
    /// Pattern checks a content type needs before it is accepted.
    pub classification_min_matches: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            hint_boost: 1.2,
            min_confidence: 0.3,
            fallback_confidence: 0.5,
            classification_min_matches: 2,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchConfig {
    pub timeout_ms: u64,
    /// Fixed User-Agent. When unset a browser UA is picked per request.
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            user_agent: None,
        }
    }
}

/// Top-level config loaded from `schema-scout.json`.
///
/// Every section and field is optional: missing keys keep their defaults and
/// unknown keys are ignored.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoutConfig {
    pub cache: CacheConfig,
    pub rate_limiting: RateLimitConfig,
    pub generation: GenerationConfig,
    pub resilience: ResilienceConfig,
    pub detection: DetectionConfig,
    pub fetch: FetchConfig,
}

impl ScoutConfig {
    pub fn from_json_str(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut v = vec![
        PathBuf::from("schema-scout.json"),
        PathBuf::from("../schema-scout.json"),
    ];
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".schema-scout").join("config.json"));
    }
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        if !env_path.trim().is_empty() {
            v.insert(0, PathBuf::from(env_path));
        }
    }
    v
}

/// Load `schema-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `SCHEMA_SCOUT_CONFIG` env var path
/// 2. `./schema-scout.json`
/// 3. `../schema-scout.json`
/// 4. `~/.schema-scout/config.json`
///
/// Missing file → `ScoutConfig::default()` (silent).
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_config() -> ScoutConfig {
    for path in candidate_paths() {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match ScoutConfig::from_json_str(&contents) {
                Ok(cfg) => {
                    tracing::info!("schema-scout config loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "schema-scout config parse error at {}: {}, using defaults",
                        path.display(),
                        e
                    );
                    return ScoutConfig::default();
                }
            },
            Err(_) => continue,
        }
    }

    ScoutConfig::default()
}

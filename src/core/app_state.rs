use std::sync::Arc;

use crate::core::config::ScoutConfig;
use crate::core::error::GenerationError;
use crate::nlp::ContentAnalyzer;
use crate::resilience::{DomainRateLimiter, ResilienceController, ResultCache};
use crate::schema::{FieldExtractor, SchemaValidator, TypeDetector};
use crate::scraping::{HtmlFetcher, HttpFetcher, PageParser};
use crate::types::GenerationResult;

/// Every service the pipeline needs, built once and shared by reference.
///
/// Cache, rate-limit windows and circuit state live here rather than in
/// process-wide statics, so two `AppState`s never see each other's counters.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ScoutConfig>,
    pub fetcher: Arc<dyn HtmlFetcher>,
    pub result_cache: Arc<ResultCache<GenerationResult>>,
    pub rate_limiter: Arc<DomainRateLimiter>,
    pub resilience: Arc<ResilienceController>,
    pub parser: Arc<PageParser>,
    pub analyzer: Arc<ContentAnalyzer>,
    pub detector: Arc<TypeDetector>,
    pub extractor: Arc<FieldExtractor>,
    pub validator: Arc<SchemaValidator>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("cache_enabled", &self.config.cache.enabled)
            .field("rate_limiting_enabled", &self.config.rate_limiting.enabled)
            .field("cache_size", &self.result_cache.stats().size)
            .finish()
    }
}

impl AppState {
    /// State backed by the reqwest fetcher.
    pub fn from_config(config: ScoutConfig) -> Result<Self, GenerationError> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    pub fn with_fetcher(config: ScoutConfig, fetcher: Arc<dyn HtmlFetcher>) -> Self {
        let rate_limiter = if config.rate_limiting.enabled {
            DomainRateLimiter::from_config(&config.rate_limiting)
        } else {
            DomainRateLimiter::disabled()
        };

        Self {
            fetcher,
            result_cache: Arc::new(ResultCache::from_config(&config.cache)),
            rate_limiter: Arc::new(rate_limiter),
            resilience: Arc::new(ResilienceController::from_config(&config)),
            parser: Arc::new(PageParser::new()),
            analyzer: Arc::new(
                ContentAnalyzer::new().with_min_matches(config.detection.classification_min_matches),
            ),
            detector: Arc::new(TypeDetector::from_config(&config.detection)),
            extractor: Arc::new(FieldExtractor::new()),
            validator: Arc::new(SchemaValidator::new()),
            config: Arc::new(config),
        }
    }
}

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::error::GenerationError;
use crate::resilience::{domain_of, fingerprint, normalize_url, should_cache};
use crate::schema::apply_fixes;
use crate::types::*;
use crate::AppState;

/// Keywords carried on a result.
const RESULT_KEYWORDS: usize = 10;

/// Generate a schema for one URL.
///
/// Only a malformed URL is returned as `Err`; fetch failures, open circuits
/// and the like come back as a result with `success == false`.
pub async fn generate(
    state: &Arc<AppState>,
    url: &str,
    opts: &GenerateOptions,
) -> Result<GenerationResult, GenerationError> {
    let started = Instant::now();
    let parsed = validate_url(url)?;
    let domain = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    // Fetch and parse the trimmed form; results echo the caller's string.
    let target = url.trim();

    info!("Generating schema for: {}", url);

    let use_cache = state.config.cache.enabled
        && opts.use_cache.unwrap_or(state.config.generation.use_cache);
    let cache_key = normalize_url(target, &opts.target_types);

    if use_cache {
        if let Some(mut cached) = state.result_cache.get(&cache_key) {
            info!("Cache hit for: {}", url);
            cached.url = url.to_string();
            cached.from_cache = true;
            cached.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(cached);
        }
    }

    let html = match fetch_html(state, target, &domain).await {
        Ok(html) => html,
        Err(e) => {
            warn!("Failed to fetch {}: {}", url, e);
            let mut failed = GenerationResult::failure(url, e.to_string());
            failed.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(failed);
        }
    };

    let mut result = generate_from_html(state, target, html, opts).await?;
    result.url = url.to_string();
    result.duration_ms = started.elapsed().as_millis() as u64;

    if use_cache && result.success {
        if let Some(schema) = result.schema.as_ref().filter(|s| should_cache(s)) {
            debug!("Caching {} result for: {}", schema["@type"], url);
            state.result_cache.put(cache_key, result.clone());
        }
    }

    info!(
        "Generated {} for {} (confidence {:.2}, {}ms)",
        result
            .detected_type
            .map(|t| t.as_str())
            .unwrap_or("nothing"),
        url,
        result.confidence,
        result.duration_ms
    );
    Ok(result)
}

/// Run the analysis half of the pipeline on HTML the caller already holds.
/// No fetching, rate limiting or caching happens here.
pub async fn generate_from_html(
    state: &Arc<AppState>,
    url: &str,
    html: String,
    opts: &GenerateOptions,
) -> Result<GenerationResult, GenerationError> {
    let started = Instant::now();
    let state = Arc::clone(state);
    let url = url.to_string();
    let opts = opts.clone();

    let mut result =
        tokio::task::spawn_blocking(move || build_result(&state, &url, &html, &opts)).await?;
    result.duration_ms = started.elapsed().as_millis() as u64;
    Ok(result)
}

fn validate_url(url: &str) -> Result<Url, GenerationError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::InvalidInput("URL is empty".into()));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|e| GenerationError::InvalidInput(format!("invalid URL '{}': {}", trimmed, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(GenerationError::InvalidInput(format!(
            "invalid URL '{}': must be an absolute http(s) URL",
            trimmed
        )));
    }
    Ok(parsed)
}

/// Rate-limited fetch under retry and the domain's circuit breaker.
async fn fetch_html(state: &AppState, url: &str, domain: &str) -> Result<String, GenerationError> {
    let key = domain_of(url).unwrap_or_else(|| domain.to_string());
    state
        .resilience
        .execute(&key, || {
            let fetcher = Arc::clone(&state.fetcher);
            let limiter = Arc::clone(&state.rate_limiter);
            let url = url.to_string();
            let domain = key.clone();
            async move {
                limiter.acquire(&domain).await;
                match fetcher.fetch(&url).await {
                    Ok(html) => {
                        limiter.report_success(&domain);
                        Ok(html)
                    }
                    Err(GenerationError::HttpStatus { status: 429 }) => {
                        limiter.penalize(&domain);
                        Err(GenerationError::HttpStatus { status: 429 })
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .await
}

/// Parse → analyze → detect → extract → validate (→ fix → re-validate).
fn build_result(state: &AppState, url: &str, html: &str, opts: &GenerateOptions) -> GenerationResult {
    let page = state.parser.parse(html, url);
    if page.title.is_empty() && page.body_text.is_empty() {
        debug!("{} has no title or text; detection will fall back", url);
    }

    let analysis = state.analyzer.analyze(&page.body_text);
    let candidates = state.detector.detect(&page, &analysis, &opts.target_types);
    let Some(best) = candidates.first().cloned() else {
        return GenerationResult::failure(url, "detection produced no candidates");
    };
    debug!(
        "{}: top candidate {} ({:.3}) via [{}]",
        url,
        best.schema_type,
        best.confidence,
        best.indicators.join(", ")
    );

    let extracted = state.extractor.extract(best.schema_type, &page);
    let mut schema = extracted.data;
    let mut validation = state.validator.validate(&schema, &opts.validation);

    if opts.auto_fix && !validation.fixes.is_empty() {
        debug!("{}: applying {} fixes", url, validation.fixes.len());
        schema = apply_fixes(&schema, &validation.fixes);
        validation = state.validator.validate(&schema, &opts.validation);
    }

    let mut keywords = analysis.keyword_terms();
    keywords.truncate(RESULT_KEYWORDS);

    GenerationResult {
        url: url.to_string(),
        success: true,
        detected_type: Some(best.schema_type),
        confidence: best.confidence,
        candidates,
        fingerprint: Some(fingerprint(&schema)),
        schema: Some(schema),
        validation: Some(validation),
        keywords,
        error: None,
        from_cache: false,
        duration_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScoutConfig;
    use crate::scraping::StaticFetcher;

    const PRODUCT_HTML: &str = r#"<html><head><title>Widget</title>
        <meta property="og:type" content="product"></head>
        <body><p>Price: $19.99. Add to cart.</p></body></html>"#;

    fn state(fetcher: StaticFetcher) -> Arc<AppState> {
        Arc::new(AppState::with_fetcher(ScoutConfig::default(), Arc::new(fetcher)))
    }

    #[test]
    fn url_validation() {
        assert!(validate_url("https://shop.test/widget").is_ok());
        assert!(matches!(validate_url(""), Err(GenerationError::InvalidInput(_))));
        assert!(matches!(validate_url("ftp://x.test/a"), Err(GenerationError::InvalidInput(_))));
        assert!(matches!(validate_url("widget"), Err(GenerationError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn product_page_end_to_end() {
        let state = state(StaticFetcher::new().with_page("https://shop.test/widget", PRODUCT_HTML));
        let result = generate(&state, "https://shop.test/widget", &GenerateOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.detected_type, Some(SchemaType::Product));
        assert!(result.confidence > 0.5);
        let schema = result.schema.unwrap();
        assert_eq!(schema["offers"]["price"], "19.99");
        assert_eq!(result.fingerprint.map(|f| f.len()), Some(64));
        assert!(!result.from_cache);
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let state = state(StaticFetcher::new().with_page("https://shop.test/widget", PRODUCT_HTML));
        let opts = GenerateOptions::default();

        let first = generate(&state, "https://shop.test/widget", &opts).await.unwrap();
        let second = generate(&state, "https://SHOP.test/widget/#top", &opts).await.unwrap();
        let third = generate(&state, "https://shop.test/widget#reviews", &opts).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert!(third.from_cache);
        assert_eq!(first.url, "https://shop.test/widget");
        assert_eq!(second.url, "https://SHOP.test/widget/#top");
        assert_eq!(third.url, "https://shop.test/widget#reviews");
        assert_eq!(first.schema, second.schema);
        assert_eq!(state.result_cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn padded_url_is_fetched_trimmed_and_echoed_verbatim() {
        let state = state(StaticFetcher::new().with_page("https://shop.test/widget", PRODUCT_HTML));
        let padded = "  https://shop.test/widget \n";

        let result = generate(&state, padded, &GenerateOptions::default()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.detected_type, Some(SchemaType::Product));
        assert_eq!(result.url, padded);
    }

    #[tokio::test]
    async fn use_cache_false_bypasses_cache() {
        let state = state(StaticFetcher::new().with_page("https://shop.test/widget", PRODUCT_HTML));
        let opts = GenerateOptions {
            use_cache: Some(false),
            ..Default::default()
        };
        generate(&state, "https://shop.test/widget", &opts).await.unwrap();
        let again = generate(&state, "https://shop.test/widget", &opts).await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(state.result_cache.stats().size, 0);
    }

    #[tokio::test]
    async fn fetch_failure_becomes_a_result() {
        let state = state(StaticFetcher::new());
        let result = generate(&state, "https://missing.test/", &GenerateOptions::default())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("upstream responded with HTTP 404"));
        assert!(result.schema.is_none());
    }

    #[tokio::test]
    async fn from_html_never_touches_the_fetcher() {
        let state = state(StaticFetcher::new());
        let result = generate_from_html(
            &state,
            "https://blog.test/post",
            "<html><body></body></html>".to_string(),
            &GenerateOptions::default(),
        )
        .await
        .unwrap();

        assert!(result.success);
        assert_eq!(result.detected_type, Some(SchemaType::WebPage));
        assert_eq!(result.candidates[0].schema_type, SchemaType::WebPage);
    }
}

//! Full-pipeline tests against in-memory fetchers (no network).

use async_trait::async_trait;
use schema_scout::scraping::{HtmlFetcher, StaticFetcher};
use schema_scout::{
    batch_generate::generate_batch, generate::generate, AppState, BatchOptions, GenerateOptions,
    GenerationError, SchemaType, ScoutConfig,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

const WIDGET_HTML: &str = r#"<title>Widget</title><meta property="og:type" content="product">Price: $19.99. Add to cart."#;

const PANCAKES_HTML: &str = r#"<html><head><title>Pancakes</title>
    <script type="application/ld+json">{"@context":"https://schema.org","@type":"Recipe","name":"Pancakes"}</script>
    </head><body><main>
    <p>Prep time: 10 minutes. Cook time: 15 minutes. Serves 4.</p>
    <h2>Ingredients</h2>
    <ul><li>2 cups flour</li><li>1 tbsp sugar</li></ul>
    <h2>Instructions</h2>
    <ol><li>Whisk the dry ingredients together.</li><li>Cook on a hot griddle until golden.</li></ol>
    </main></body></html>"#;

/// Counts fetches and delegates to a [`StaticFetcher`].
struct CountingFetcher {
    inner: StaticFetcher,
    calls: AtomicUsize,
}

#[async_trait]
impl HtmlFetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(url).await
    }
}

/// Answers 503 for one host and serves the widget page everywhere else.
struct FlakyHostFetcher {
    down_host: &'static str,
    calls_to_down_host: AtomicUsize,
}

#[async_trait]
impl HtmlFetcher for FlakyHostFetcher {
    async fn fetch(&self, url: &str) -> Result<String, GenerationError> {
        if url.contains(self.down_host) {
            self.calls_to_down_host.fetch_add(1, Ordering::SeqCst);
            return Err(GenerationError::HttpStatus { status: 503 });
        }
        Ok(WIDGET_HTML.to_string())
    }
}

fn quick_retry_config() -> ScoutConfig {
    let mut config = ScoutConfig::default();
    config.resilience.base_delay_ms = 1;
    config.resilience.jitter = false;
    config
}

#[tokio::test]
async fn widget_example_detects_product_and_price() {
    init_logger();
    let fetcher = StaticFetcher::new().with_page("https://shop.test/widget", WIDGET_HTML);
    let state = Arc::new(AppState::with_fetcher(ScoutConfig::default(), Arc::new(fetcher)));

    let result = generate(&state, "https://shop.test/widget", &GenerateOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    let top = &result.candidates[0];
    assert_eq!(top.schema_type, SchemaType::Product);
    assert!(top.confidence > 0.5);

    let schema = result.schema.expect("schema");
    assert_eq!(schema["@context"], "https://schema.org");
    assert_eq!(schema["@type"], "Product");
    assert_eq!(schema["name"], "Widget");
    assert_eq!(schema["offers"]["price"], "19.99");
    assert_eq!(schema["offers"]["priceCurrency"], "USD");

    let validation = result.validation.expect("validation");
    assert!(validation.score <= 100);
}

#[tokio::test]
async fn recipe_page_with_hint() {
    init_logger();
    let fetcher = StaticFetcher::new().with_page("https://food.test/pancakes", PANCAKES_HTML);
    let state = Arc::new(AppState::with_fetcher(ScoutConfig::default(), Arc::new(fetcher)));
    let opts = GenerateOptions {
        target_types: vec![SchemaType::Recipe],
        ..Default::default()
    };

    let result = generate(&state, "https://food.test/pancakes", &opts).await.unwrap();

    assert_eq!(result.detected_type, Some(SchemaType::Recipe));
    let schema = result.schema.unwrap();
    assert_eq!(schema["name"], "Pancakes");
    assert_eq!(schema["recipeIngredient"], json!(["2 cups flour", "1 tbsp sugar"]));
    assert_eq!(schema["prepTime"], "PT10M");
    assert!(result
        .candidates
        .windows(2)
        .all(|w| w[0].confidence >= w[1].confidence));
}

#[tokio::test]
async fn cached_results_skip_the_fetch() {
    init_logger();
    let fetcher = Arc::new(CountingFetcher {
        inner: StaticFetcher::new().with_page("https://shop.test/widget", WIDGET_HTML),
        calls: AtomicUsize::new(0),
    });
    let state = Arc::new(AppState::with_fetcher(ScoutConfig::default(), fetcher.clone()));
    let opts = GenerateOptions::default();

    let first = generate(&state, "https://shop.test/widget", &opts).await.unwrap();
    let second = generate(&state, "https://shop.test/widget?", &opts).await.unwrap();

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert!(second.from_cache);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(second.url, "https://shop.test/widget?");

    let hinted = GenerateOptions {
        target_types: vec![SchemaType::Product],
        ..Default::default()
    };
    let third = generate(&state, "https://shop.test/widget", &hinted).await.unwrap();
    assert!(!third.from_cache);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn batch_isolates_failures_and_keeps_order() {
    init_logger();
    let fetcher = StaticFetcher::new()
        .with_page("https://shop.test/1", WIDGET_HTML)
        .with_page("https://food.test/2", PANCAKES_HTML)
        .with_page("https://shop.test/4", WIDGET_HTML)
        .with_page("https://blog.test/6", "<p>short note</p>");
    let state = Arc::new(AppState::with_fetcher(ScoutConfig::default(), Arc::new(fetcher)));
    let urls: Vec<String> = [
        "https://shop.test/1",
        "https://food.test/2",
        "https://gone.test/3",
        "https://shop.test/4",
        "",
        "https://blog.test/6",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let opts = BatchOptions {
        concurrency: Some(3),
        ..Default::default()
    };
    let report = generate_batch(&state, urls.clone(), &opts).await;

    assert_eq!(report.results.len(), urls.len());
    for (result, url) in report.results.iter().zip(&urls) {
        assert_eq!(&result.url, url);
    }
    let flags: Vec<bool> = report.results.iter().map(|r| r.success).collect();
    assert_eq!(flags, vec![true, true, false, true, false, true]);
    assert_eq!(report.results[2].error.as_deref(), Some("upstream responded with HTTP 404"));
    assert_eq!(report.results[5].detected_type, Some(SchemaType::WebPage));
}

#[tokio::test]
async fn batch_results_echo_each_input_url_even_when_cached() {
    init_logger();
    let fetcher = StaticFetcher::new().with_page("https://shop.test/widget", WIDGET_HTML);
    let state = Arc::new(AppState::with_fetcher(ScoutConfig::default(), Arc::new(fetcher)));
    let urls: Vec<String> = ["https://shop.test/widget", "https://SHOP.test/widget/?"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let opts = BatchOptions {
        concurrency: Some(1),
        ..Default::default()
    };

    let report = generate_batch(&state, urls.clone(), &opts).await;

    assert_eq!(report.successful, 2);
    assert!(report.results[1].from_cache);
    let echoed: Vec<&str> = report.results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(echoed, urls);
}

#[tokio::test]
async fn open_circuit_fails_fast_without_touching_siblings() {
    init_logger();
    let mut config = quick_retry_config();
    config.resilience.failure_threshold = 2;
    config.generation.max_retries = 2;
    config.cache.enabled = false;

    let fetcher = Arc::new(FlakyHostFetcher {
        down_host: "down.test",
        calls_to_down_host: AtomicUsize::new(0),
    });
    let state = Arc::new(AppState::with_fetcher(config, fetcher.clone()));
    let opts = GenerateOptions::default();

    let first = generate(&state, "https://down.test/a", &opts).await.unwrap();
    assert_eq!(first.error.as_deref(), Some("upstream responded with HTTP 503"));
    assert_eq!(fetcher.calls_to_down_host.load(Ordering::SeqCst), 2);

    let second = generate(&state, "https://down.test/b", &opts).await.unwrap();
    assert!(!second.success);
    assert_eq!(second.error.as_deref(), Some("circuit open for 'down.test'"));
    assert_eq!(fetcher.calls_to_down_host.load(Ordering::SeqCst), 2);

    let sibling = generate(&state, "https://up.test/a", &opts).await.unwrap();
    assert!(sibling.success);
}

#[tokio::test]
async fn single_generate_rejects_malformed_urls() {
    let state = Arc::new(AppState::with_fetcher(
        ScoutConfig::default(),
        Arc::new(StaticFetcher::new()),
    ));
    let err = generate(&state, "   ", &GenerateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::InvalidInput(_)));
}

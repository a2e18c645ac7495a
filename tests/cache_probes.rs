use std::sync::Arc;
use std::time::Duration;
use throttle_gate::infrastructure::mocks::{MockCacheStore, MockCaptureLayer};
use throttle_gate::{CacheProbeAdapter, ThrottleGate};
use tokio::time::Instant;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

fn gate() -> ThrottleGate {
    ThrottleGate::builder()
        .with_max_calls_per_window(3)
        .with_window(Duration::from_secs(60))
        .with_calls_per_second(10.0)
        .build()
        .unwrap()
}

fn quote_key(symbol: &str) -> String {
    format!("quote:{}", symbol)
}

#[tokio::test(start_paused = true)]
async fn test_adapter_probe_bypasses_on_hit() {
    let gate = gate();
    let store = Arc::new(MockCacheStore::new());
    store.insert("quote:AAPL");
    let quotes = CacheProbeAdapter::new(Arc::clone(&store), quote_key);

    let start = Instant::now();
    for _ in 0..10 {
        gate.execute("quotes", quotes.probe("AAPL"), || async {})
            .await;
    }

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(store.lookups(), 10);
    assert!(gate.snapshot("quotes").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_adapter_probe_throttles_on_miss() {
    let gate = gate();
    let store = Arc::new(MockCacheStore::new());
    let quotes = CacheProbeAdapter::new(Arc::clone(&store), quote_key);

    for symbol in ["AAPL", "MSFT", "GOOG"] {
        gate.execute("quotes", quotes.probe(symbol), || async {})
            .await;
        // The operation fills the cache the probe reads
        store.insert(quotes.key_for(symbol));
    }

    assert_eq!(gate.snapshot("quotes").await.unwrap().calls_in_window, 3);

    let start = Instant::now();
    gate.execute("quotes", quotes.probe("MSFT"), || async {})
        .await;
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_failing_store_behaves_like_a_miss() {
    let failing = gate();
    let missing = gate();
    let store = Arc::new(MockCacheStore::new());
    store.insert("quote:AAPL");
    store.set_failing(true);
    let quotes = CacheProbeAdapter::new(Arc::clone(&store), quote_key);

    let start = Instant::now();
    for _ in 0..4 {
        failing
            .execute("quotes", quotes.probe("AAPL"), || async {})
            .await;
    }
    let failing_elapsed = start.elapsed();

    let start = Instant::now();
    for _ in 0..4 {
        missing.execute("quotes", || false, || async {}).await;
    }

    assert_eq!(failing_elapsed, start.elapsed());
    assert!(failing_elapsed >= Duration::from_secs(60));
    assert_eq!(failing.metrics().probe_failures(), 4);
    assert_eq!(failing.metrics().cache_hits(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_logged_at_debug() {
    let capture = MockCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let gate = gate();
    let store = Arc::new(MockCacheStore::new());
    store.set_failing(true);
    let quotes = CacheProbeAdapter::new(store, quote_key);

    let value = gate
        .execute("quotes", quotes.probe("AAPL"), || async { 187 })
        .await;
    assert_eq!(value, 187);

    let failures = capture.events_containing("cache probe failed");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].level, Level::DEBUG);
    assert_eq!(failures[0].field("identity"), Some("quotes"));
    assert_eq!(failures[0].field("error"), Some("mock cache unavailable"));
}

#[tokio::test(start_paused = true)]
async fn test_waits_and_hits_are_logged() {
    let capture = MockCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let gate = gate();
    gate.execute("quotes", || false, || async {}).await;
    gate.execute("quotes", || false, || async {}).await;
    gate.execute("quotes", || true, || async {}).await;

    let waits = capture.events_containing("delaying call");
    assert_eq!(waits.len(), 1);
    assert_eq!(waits[0].level, Level::DEBUG);
    assert_eq!(waits[0].field("reason"), Some("interval"));
    assert_eq!(waits[0].field("wait_ms"), Some("100"));

    let hits = capture.events_containing("cache hit");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].level, Level::TRACE);
}

#[test]
fn test_is_cached_fails_safe() {
    let store = Arc::new(MockCacheStore::new());
    store.insert("quote:AAPL");
    let quotes = CacheProbeAdapter::new(Arc::clone(&store), quote_key);

    assert!(quotes.is_cached("AAPL"));
    assert!(!quotes.is_cached("MSFT"));

    store.set_failing(true);
    assert!(!quotes.is_cached("AAPL"));
}

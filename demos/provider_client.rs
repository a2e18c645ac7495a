//! A quote client that throttles provider calls but serves repeats from cache.
//!
//! Run with: `cargo run --example provider_client`

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use throttle_gate::{CacheProbeAdapter, CacheStore, ThrottleGate};
use tokio::time::Instant;
use tracing::{info, Level};

/// Quotes fetched so far, keyed by `quote:<symbol>`.
#[derive(Default)]
struct QuoteCache {
    entries: Mutex<HashMap<String, f64>>,
}

impl QuoteCache {
    fn get(&self, key: &str) -> Option<f64> {
        self.entries.lock().unwrap().get(key).copied()
    }

    fn put(&self, key: String, price: f64) {
        self.entries.lock().unwrap().insert(key, price);
    }
}

impl CacheStore for QuoteCache {
    type Key = String;
    type Error = Infallible;

    fn contains(&self, key: &String) -> Result<bool, Infallible> {
        Ok(self.entries.lock().unwrap().contains_key(key))
    }
}

type KeyFn = fn(&str) -> String;

struct QuoteClient {
    gate: ThrottleGate,
    cache: Arc<QuoteCache>,
    probes: CacheProbeAdapter<QuoteCache, KeyFn>,
}

impl QuoteClient {
    fn new(gate: ThrottleGate) -> Self {
        let cache = Arc::new(QuoteCache::default());
        let key: KeyFn = |symbol| format!("quote:{}", symbol);
        Self {
            gate,
            probes: CacheProbeAdapter::new(Arc::clone(&cache), key),
            cache,
        }
    }

    async fn quote(&self, symbol: &str) -> Result<f64, String> {
        let key = self.probes.key_for(symbol);
        let cache = &self.cache;
        self.gate
            .execute("quotes-api", self.probes.probe(symbol), || async move {
                if let Some(price) = cache.get(&key) {
                    return Ok(price);
                }
                let price = fetch_from_provider(symbol).await?;
                cache.put(key, price);
                Ok(price)
            })
            .await
    }
}

/// Stand-in for an HTTP request to a rate-limited provider.
async fn fetch_from_provider(symbol: &str) -> Result<f64, String> {
    tokio::time::sleep(Duration::from_millis(20)).await;
    match symbol {
        "AAPL" => Ok(187.3),
        "MSFT" => Ok(411.2),
        "GOOG" => Ok(141.8),
        other => Err(format!("unknown symbol {}", other)),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let gate = ThrottleGate::builder()
        .with_max_calls_per_window(3)
        .with_window(Duration::from_secs(5))
        .with_calls_per_second(4.0)
        .build()
        .expect("valid limiter settings");
    let client = QuoteClient::new(gate.clone());
    let start = Instant::now();

    for symbol in ["AAPL", "MSFT", "AAPL", "GOOG", "MSFT", "TSLA", "AAPL"] {
        match client.quote(symbol).await {
            Ok(price) => info!(symbol, price, elapsed = ?start.elapsed(), "quote"),
            Err(e) => info!(symbol, error = %e, elapsed = ?start.elapsed(), "quote failed"),
        }
    }

    let metrics = gate.metrics().snapshot();
    info!(
        provider_calls = metrics.calls_throttled,
        cache_hits = metrics.cache_hits,
        total_wait = ?metrics.total_wait,
        "done"
    );

    if let Some(state) = gate.snapshot("quotes-api").await {
        info!(
            calls_in_window = state.calls_in_window,
            next_call_delay = ?state.next_call_delay,
            "quotes-api limiter state"
        );
    }
}

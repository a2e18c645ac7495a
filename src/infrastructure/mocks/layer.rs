//! Tracing layer that records emitted events.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::Level;
use tracing_subscriber::Layer;

/// Layer that stores every event it sees, with its fields rendered as text.
///
/// # Examples
///
/// ```
/// use throttle_gate::infrastructure::mocks::MockCaptureLayer;
/// use tracing::debug;
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let capture = MockCaptureLayer::new();
/// let subscriber = tracing_subscriber::registry().with(capture.clone());
///
/// tracing::subscriber::with_default(subscriber, || {
///     debug!(identity = "quotes", "cache probe failed");
/// });
///
/// let events = capture.events();
/// assert_eq!(events[0].message, "cache probe failed");
/// assert_eq!(events[0].field("identity"), Some("quotes"));
/// ```
#[derive(Clone, Default)]
pub struct MockCaptureLayer {
    captured: Arc<Mutex<Vec<CapturedEvent>>>,
}

/// One recorded event.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    /// Rendered value of a non-message field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

impl MockCaptureLayer {
    /// Create an empty capture layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock().clone()
    }

    /// Events whose message contains `needle`.
    pub fn events_containing(&self, needle: &str) -> Vec<CapturedEvent> {
        self.lock()
            .iter()
            .filter(|event| event.message.contains(needle))
            .cloned()
            .collect()
    }

    /// Number of events recorded.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Forget every recorded event.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CapturedEvent>> {
        self.captured.lock().expect(
            "MockCaptureLayer mutex poisoned - a test thread panicked while holding the lock",
        )
    }
}

impl<S> Layer<S> for MockCaptureLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        self.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.insert(field.name().to_string(), rendered);
        }
    }
}

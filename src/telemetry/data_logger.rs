use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Zero-argument pull of a channel's current value.
pub type ChannelFn = Box<dyn Fn() -> String + Send + Sync>;

/// Where components register their named telemetry channels.
pub trait TelemetrySink: Send + Sync {
    fn add_channel(&self, name: &str, producer: ChannelFn);
}

/// Ordered channel registry. Every read evaluates the producers, nothing is
/// cached.
#[derive(Default)]
pub struct DataLogger {
    channels: RwLock<IndexMap<String, ChannelFn>>,
}

impl DataLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.read().keys().cloned().collect()
    }

    pub fn read(&self, name: &str) -> Option<String> {
        self.channels.read().get(name).map(|producer| producer())
    }

    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.channels
            .read()
            .iter()
            .map(|(name, producer)| (name.clone(), producer()))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let values: serde_json::Map<String, serde_json::Value> = self
            .snapshot()
            .into_iter()
            .map(|(name, value)| (name, serde_json::Value::String(value)))
            .collect();
        serde_json::Value::Object(values)
    }

    pub fn log_snapshot(&self) {
        tracing::info!(target: "telemetry", "{}", self.to_json());
    }

    /// Samples every channel once per `period` until `cancel_token` fires.
    pub fn spawn_sampler(
        self: Arc<Self>,
        period: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = ticker.tick() => self.log_snapshot(),
                }
            }
            tracing::debug!("Telemetry sampler stopped");
        })
    }
}

impl TelemetrySink for DataLogger {
    // Re-registering a name replaces the producer but keeps its position.
    fn add_channel(&self, name: &str, producer: ChannelFn) {
        self.channels.write().insert(name.to_string(), producer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn channels_are_read_lazily_in_registration_order() {
        let logger = DataLogger::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let reads = counter.clone();
        logger.add_channel(
            "reads",
            Box::new(move || (reads.fetch_add(1, Ordering::SeqCst) + 1).to_string()),
        );
        logger.add_channel("constant", Box::new(|| "7".to_string()));

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(logger.read("reads").as_deref(), Some("1"));
        assert_eq!(logger.read("reads").as_deref(), Some("2"));
        assert_eq!(
            logger.snapshot(),
            vec![
                ("reads".to_string(), "3".to_string()),
                ("constant".to_string(), "7".to_string()),
            ]
        );
        assert_eq!(logger.read("missing"), None);
    }

    #[test]
    fn re_registering_replaces_channel() {
        let logger = DataLogger::new();
        logger.add_channel("a", Box::new(|| "old".to_string()));
        logger.add_channel("b", Box::new(|| "b".to_string()));
        logger.add_channel("a", Box::new(|| "new".to_string()));
        assert_eq!(logger.channel_names(), vec!["a", "b"]);
        assert_eq!(logger.read("a").as_deref(), Some("new"));
    }

    #[test]
    fn json_snapshot_holds_every_channel() {
        let logger = DataLogger::new();
        logger.add_channel("x", Box::new(|| "1".to_string()));
        assert_eq!(logger.to_json(), serde_json::json!({ "x": "1" }));
    }

    #[tokio::test]
    async fn sampler_stops_on_cancel() {
        let logger = Arc::new(DataLogger::new());
        let samples = Arc::new(AtomicUsize::new(0));
        let counted = samples.clone();
        logger.add_channel(
            "tick",
            Box::new(move || counted.fetch_add(1, Ordering::SeqCst).to_string()),
        );

        let token = CancellationToken::new();
        let sampler = logger.clone().spawn_sampler(Duration::from_millis(5), token.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        sampler.await.unwrap();

        let taken = samples.load(Ordering::SeqCst);
        assert!(taken >= 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(samples.load(Ordering::SeqCst), taken);
    }
}

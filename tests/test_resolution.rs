use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use livelist::cache::StreamCache;
use livelist::extractor::StreamExtractor;
use livelist::orchestrator::{Orchestrator, OrchestratorConfig, Origin};
use livelist::resolver::{BoundedResolver, VariantStrategy};

const PLACEHOLDER: &str = "https://static.example/offline.m3u";

// Test Helpers & Mocks

/// What one extraction attempt should do. Attempts consume the script in
/// call order, across variants and across resolver calls.
#[derive(Clone)]
enum Step {
    Return(&'static str),
    Fail,
    /// Deliver a result only after the given delay
    SlowReturn(&'static str, Duration),
    /// Never deliver within any realistic deadline
    Hang,
}

struct ScriptedExtractor {
    script: Vec<Step>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl StreamExtractor for ScriptedExtractor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn extract(&self, _channel_url: &str) -> Result<String> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.get(idx).cloned().unwrap_or(Step::Fail) {
            Step::Return(url) => Ok(url.to_string()),
            Step::Fail => bail!("scripted failure"),
            Step::SlowReturn(url, delay) => {
                tokio::time::sleep(delay).await;
                Ok(url.to_string())
            }
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(100_000)).await;
                bail!("unreachable")
            }
        }
    }
}

/// Records every URL it is asked to extract, then fails.
struct RecordingExtractor {
    attempted: Mutex<Vec<String>>,
}

impl RecordingExtractor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            attempted: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl StreamExtractor for RecordingExtractor {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn extract(&self, channel_url: &str) -> Result<String> {
        self.attempted.lock().unwrap().push(channel_url.to_string());
        bail!("recording extractor never resolves")
    }
}

fn resolver_with(
    extractor: Arc<dyn StreamExtractor>,
    deadline: Duration,
    attempt_timeout: Duration,
) -> BoundedResolver {
    BoundedResolver::new(extractor, deadline, attempt_timeout)
}

fn orchestrator_with(script: Vec<Step>) -> Orchestrator {
    let resolver = resolver_with(
        ScriptedExtractor::new(script),
        Duration::from_secs(6),
        Duration::from_secs(4),
    );
    Orchestrator::new(
        resolver,
        OrchestratorConfig {
            cache_ttl_secs: 1800,
            placeholder_url: PLACEHOLDER.to_string(),
        },
    )
}

mod resolver_tests {
    use super::*;

    #[tokio::test]
    async fn first_successful_variant_wins() {
        let resolver = resolver_with(
            ScriptedExtractor::new(vec![Step::Return("https://a/x.m3u8")]),
            Duration::from_secs(6),
            Duration::from_secs(4),
        );

        let url = resolver.resolve_with_timeout("https://ch/1").await;
        assert_eq!(url.as_deref(), Some("https://a/x.m3u8"));
    }

    #[tokio::test]
    async fn failed_variant_falls_through_to_the_next() {
        let extractor = ScriptedExtractor::new(vec![Step::Fail, Step::Return("https://a/x.m3u8")]);
        let resolver = resolver_with(
            extractor.clone(),
            Duration::from_secs(6),
            Duration::from_secs(4),
        );

        let url = resolver.resolve_with_timeout("https://ch/1").await;
        assert_eq!(url.as_deref(), Some("https://a/x.m3u8"));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_variants_resolve_to_none() {
        let resolver = resolver_with(
            ScriptedExtractor::new(vec![Step::Fail, Step::Fail]),
            Duration::from_secs(6),
            Duration::from_secs(4),
        );

        assert_eq!(resolver.resolve_with_timeout("https://ch/1").await, None);
    }

    #[tokio::test]
    async fn variants_are_attempted_in_order() {
        let extractor = RecordingExtractor::new();
        let resolver = resolver_with(
            extractor.clone(),
            Duration::from_secs(6),
            Duration::from_secs(4),
        );

        resolver
            .resolve_with_timeout("https://www.youtube.com/@somechannel")
            .await;

        let attempted = extractor.attempted.lock().unwrap().clone();
        assert_eq!(
            attempted,
            vec![
                "https://www.youtube.com/@somechannel".to_string(),
                "https://www.youtube.com/@somechannel/live".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn custom_variant_strategy_replaces_the_default() {
        struct LiteralOnly;
        impl VariantStrategy for LiteralOnly {
            fn variants(&self, channel_url: &str) -> Vec<String> {
                vec![channel_url.to_string()]
            }
        }

        let extractor = RecordingExtractor::new();
        let resolver = resolver_with(
            extractor.clone(),
            Duration::from_secs(6),
            Duration::from_secs(4),
        )
        .with_variant_strategy(Arc::new(LiteralOnly));

        resolver.resolve_with_timeout("https://ch/1").await;

        let attempted = extractor.attempted.lock().unwrap().clone();
        assert_eq!(attempted, vec!["https://ch/1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_holds_even_when_extraction_hangs() {
        let resolver = resolver_with(
            ScriptedExtractor::new(vec![Step::Hang, Step::Hang]),
            Duration::from_secs(6),
            Duration::from_secs(6),
        );

        let started = tokio::time::Instant::now();
        let url = resolver.resolve_with_timeout("https://ch/1").await;

        assert_eq!(url, None);
        assert!(started.elapsed() >= Duration::from_secs(6));
        assert!(started.elapsed() < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn one_hung_attempt_cannot_starve_later_variants() {
        // Attempt 1 hangs past its own 2s timeout; attempt 2 succeeds well
        // within the 6s deadline.
        let resolver = resolver_with(
            ScriptedExtractor::new(vec![Step::Hang, Step::Return("https://a/x.m3u8")]),
            Duration::from_secs(6),
            Duration::from_secs(2),
        );

        let url = resolver.resolve_with_timeout("https://ch/1").await;
        assert_eq!(url.as_deref(), Some("https://a/x.m3u8"));
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_is_never_delivered_to_a_later_call() {
        // Call 1's only delivery would arrive long after the deadline; call 2
        // must see its own (failing) attempts, not call 1's stale result.
        let resolver = resolver_with(
            ScriptedExtractor::new(vec![
                Step::SlowReturn("https://late.example/x.m3u8", Duration::from_secs(600)),
                Step::Fail,
                Step::Fail,
            ]),
            Duration::from_secs(6),
            Duration::from_secs(1000),
        );

        assert_eq!(resolver.resolve_with_timeout("https://ch/1").await, None);
        assert_eq!(resolver.resolve_with_timeout("https://ch/1").await, None);
    }
}

mod orchestrator_tests {
    use super::*;

    #[tokio::test]
    async fn fresh_resolution_is_returned_and_cached() {
        let orchestrator = orchestrator_with(vec![Step::Return("https://a/x.m3u8")]);
        let mut cache = StreamCache::in_memory();

        let resolution = orchestrator
            .resolve_channel(&mut cache, "https://ch/1", 1000)
            .await;

        assert_eq!(resolution.url, "https://a/x.m3u8");
        assert_eq!(resolution.origin, Origin::Fresh);
        // Cached under the channel key with ts == now
        assert_eq!(
            cache.get_if_fresh("https://ch/1", 0, 1000),
            Some("https://a/x.m3u8")
        );
    }

    #[tokio::test]
    async fn failure_falls_back_to_a_within_ttl_cache_entry() {
        let orchestrator = orchestrator_with(vec![Step::Fail, Step::Fail]);
        let mut cache = StreamCache::in_memory();
        cache.put("https://ch/1", "https://old", 900);

        let resolution = orchestrator
            .resolve_channel(&mut cache, "https://ch/1", 1000)
            .await;

        assert_eq!(resolution.url, "https://old");
        assert_eq!(resolution.origin, Origin::StaleCache);
        // No TTL renewal on read: the entry still dates from ts = 900
        assert_eq!(cache.get_if_fresh("https://ch/1", 99, 1000), None);
        assert_eq!(
            cache.get_if_fresh("https://ch/1", 100, 1000),
            Some("https://old")
        );
    }

    #[tokio::test]
    async fn failure_with_an_expired_entry_yields_the_placeholder() {
        let orchestrator = orchestrator_with(vec![Step::Fail, Step::Fail]);
        let mut cache = StreamCache::in_memory();
        cache.put("https://ch/1", "https://old", -1000); // age 2000s > ttl 1800s

        let resolution = orchestrator
            .resolve_channel(&mut cache, "https://ch/1", 1000)
            .await;

        assert_eq!(resolution.url, PLACEHOLDER);
        assert_eq!(resolution.origin, Origin::Placeholder);
    }

    #[tokio::test]
    async fn repeated_failure_on_an_empty_cache_stays_on_the_placeholder() {
        let orchestrator = orchestrator_with(vec![Step::Fail; 4]);
        let mut cache = StreamCache::in_memory();

        for _ in 0..2 {
            let resolution = orchestrator
                .resolve_channel(&mut cache, "https://ch/1", 1000)
                .await;
            assert_eq!(resolution.url, PLACEHOLDER);
            assert_eq!(resolution.origin, Origin::Placeholder);
        }

        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn successful_resolution_overwrites_an_older_entry() {
        let orchestrator = orchestrator_with(vec![Step::Return("https://a/new.m3u8")]);
        let mut cache = StreamCache::in_memory();
        cache.put("https://ch/1", "https://a/old.m3u8", 500);

        let resolution = orchestrator
            .resolve_channel(&mut cache, "https://ch/1", 1000)
            .await;

        assert_eq!(resolution.origin, Origin::Fresh);
        assert_eq!(
            cache.get_if_fresh("https://ch/1", 0, 1000),
            Some("https://a/new.m3u8")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_channel_returns_within_the_deadline() {
        let orchestrator = orchestrator_with(vec![Step::Hang, Step::Hang]);
        let mut cache = StreamCache::in_memory();

        let started = tokio::time::Instant::now();
        let resolution = orchestrator
            .resolve_channel(&mut cache, "https://ch/1", 1000)
            .await;

        assert_eq!(resolution.origin, Origin::Placeholder);
        assert!(started.elapsed() < Duration::from_secs(7));
    }

    #[tokio::test]
    async fn fresh_resolution_persists_the_cache_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let orchestrator = orchestrator_with(vec![Step::Return("https://a/x.m3u8")]);
        let mut cache = StreamCache::load(&path).await;
        orchestrator
            .resolve_channel(&mut cache, "https://ch/1", 1000)
            .await;

        let reloaded = StreamCache::load(&path).await;
        assert_eq!(
            reloaded.get_if_fresh("https://ch/1", 0, 1000),
            Some("https://a/x.m3u8")
        );
    }

    #[tokio::test]
    async fn cache_fallback_does_not_touch_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let orchestrator = orchestrator_with(vec![Step::Fail; 4]);
        let mut cache = StreamCache::load(&path).await;
        cache.put("https://ch/1", "https://old", 900);

        let resolution = orchestrator
            .resolve_channel(&mut cache, "https://ch/1", 1000)
            .await;

        assert_eq!(resolution.origin, Origin::StaleCache);
        assert!(!path.exists());
    }
}

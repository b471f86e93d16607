use std::fmt;

use tracing::{info, warn};

use crate::{cache::StreamCache, resolver::BoundedResolver};

/// Fixed always-available fallback stream, emitted when a channel can neither
/// be resolved nor served from cache.
pub const DEFAULT_PLACEHOLDER_URL: &str =
    "https://raw.githubusercontent.com/benmoose39/YouTube_to_m3u/main/assets/moose_na.m3u";

/// Where the emitted URL for a channel came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Newly resolved this run
    Fresh,
    /// Resolver failed; served from a within-TTL cache entry
    StaleCache,
    /// Nothing usable; fixed placeholder stream
    Placeholder,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::StaleCache => write!(f, "stale-cache"),
            Self::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// The chosen URL for a channel plus its origin tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub url: String,
    pub origin: Origin,
}

/// Explicit knobs for the degradation policy. Injected by the caller rather
/// than read from ambient globals so the pipeline stays testable.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum age in seconds at which a cached resolution is still usable
    pub cache_ttl_secs: i64,
    pub placeholder_url: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 30 * 60,
            placeholder_url: DEFAULT_PLACEHOLDER_URL.to_string(),
        }
    }
}

/// Composes resolver, cache and placeholder into the three-tier policy.
/// Always produces a URL; no per-channel failure escapes this layer.
pub struct Orchestrator {
    resolver: BoundedResolver,
    config: OrchestratorConfig,
}

impl Orchestrator {
    #[must_use]
    pub const fn new(resolver: BoundedResolver, config: OrchestratorConfig) -> Self {
        Self { resolver, config }
    }

    /// Resolves one channel, strict tier order, first success wins:
    ///
    /// 1. Bounded resolution - on success the cache is updated with
    ///    `ts = now` and persisted.
    /// 2. A within-TTL cache entry, served read-only. The timestamp is not
    ///    refreshed; the entry keeps aging toward expiry.
    /// 3. The placeholder URL.
    pub async fn resolve_channel(
        &self,
        cache: &mut StreamCache,
        channel_url: &str,
        now: i64,
    ) -> Resolution {
        if let Some(url) = self.resolver.resolve_with_timeout(channel_url).await {
            cache.put(channel_url, &url, now);
            cache.persist().await;
            return Resolution {
                url,
                origin: Origin::Fresh,
            };
        }

        if let Some(url) = cache.get_if_fresh(channel_url, self.config.cache_ttl_secs, now) {
            info!("Using cached stream for {channel_url}");
            return Resolution {
                url: url.to_string(),
                origin: Origin::StaleCache,
            };
        }

        warn!("Could not extract stream from {channel_url}");
        Resolution {
            url: self.config.placeholder_url.clone(),
            origin: Origin::Placeholder,
        }
    }
}

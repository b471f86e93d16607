use std::{sync::Arc, time::Duration};

use tokio::{sync::oneshot, time::timeout};
use tracing::{debug, warn};

use crate::extractor::StreamExtractor;

/// Produces the ordered list of URL forms to attempt for one logical channel.
///
/// Different platforms expose different alternates; the resolver attempts
/// whatever the strategy yields, strictly in order.
pub trait VariantStrategy: Send + Sync {
    fn variants(&self, channel_url: &str) -> Vec<String>;
}

/// Default strategy for sites that expose both a canonical channel page and a
/// dedicated live-broadcast page: the literal URL first, then the `/live`
/// suffix appended (or stripped, when already present).
pub struct LiveSuffix;

impl VariantStrategy for LiveSuffix {
    fn variants(&self, channel_url: &str) -> Vec<String> {
        let alternate = channel_url.strip_suffix("/live").map_or_else(
            || format!("{channel_url}/live"),
            std::string::ToString::to_string,
        );

        vec![channel_url.to_string(), alternate]
    }
}

/// Runs an extraction backend under a hard wall-clock deadline.
///
/// The multi-variant attempt sequence executes on a spawned task; the caller
/// waits at most `deadline` for the handoff and then proceeds without it.
/// The task is never forcibly aborted - a result that arrives late lands in
/// this call's dropped [`oneshot`] receiver and is never observed.
pub struct BoundedResolver {
    extractor: Arc<dyn StreamExtractor>,
    variants: Arc<dyn VariantStrategy>,
    deadline: Duration,
    attempt_timeout: Duration,
}

impl BoundedResolver {
    #[must_use]
    pub fn new(
        extractor: Arc<dyn StreamExtractor>,
        deadline: Duration,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            variants: Arc::new(LiveSuffix),
            deadline,
            attempt_timeout,
        }
    }

    #[must_use]
    pub fn with_variant_strategy(mut self, variants: Arc<dyn VariantStrategy>) -> Self {
        self.variants = variants;
        self
    }

    /// Attempts every URL variant of `channel_url` in order and returns the
    /// first stream URL handed back before the deadline, `None` otherwise.
    ///
    /// Every failure mode - backend error, no stream in the response, one
    /// attempt timing out, the whole sequence exceeding the deadline -
    /// collapses to `None`; the distinction only shows up in the logs.
    pub async fn resolve_with_timeout(&self, channel_url: &str) -> Option<String> {
        // Fresh channel per call: a stale result from an abandoned attempt
        // cannot cross over into a later call's handoff.
        let (tx, rx) = oneshot::channel::<Option<String>>();

        let extractor = Arc::clone(&self.extractor);
        let urls = self.variants.variants(channel_url);
        let attempt_timeout = self.attempt_timeout;

        tokio::spawn(async move {
            for url in urls {
                match timeout(attempt_timeout, extractor.extract(&url)).await {
                    Ok(Ok(stream_url)) => {
                        let _ = tx.send(Some(stream_url));
                        return;
                    }
                    Ok(Err(e)) => debug!("{}: variant {url} failed: {e:#}", extractor.name()),
                    Err(_) => debug!("{}: variant {url} timed out", extractor.name()),
                }
            }

            let _ = tx.send(None);
        });

        match timeout(self.deadline, rx).await {
            Ok(Ok(Some(stream_url))) => Some(stream_url),
            Ok(Ok(None)) => {
                debug!("Every URL variant of {channel_url} failed to resolve");
                None
            }
            // Worker dropped its sender without a handoff
            Ok(Err(_)) => None,
            Err(_) => {
                warn!(
                    "Timeout: channel {channel_url} took too long (>{:?})",
                    self.deadline
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_url_is_attempted_first() {
        let variants = LiveSuffix.variants("https://www.youtube.com/@somechannel");
        assert_eq!(
            variants,
            vec![
                "https://www.youtube.com/@somechannel".to_string(),
                "https://www.youtube.com/@somechannel/live".to_string(),
            ]
        );
    }

    #[test]
    fn live_suffix_is_stripped_when_already_present() {
        let variants = LiveSuffix.variants("https://www.youtube.com/@somechannel/live");
        assert_eq!(
            variants,
            vec![
                "https://www.youtube.com/@somechannel/live".to_string(),
                "https://www.youtube.com/@somechannel".to_string(),
            ]
        );
    }
}

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Browser User-Agent sent on channel page fetches and handed to yt-dlp.
/// Some sites gate the live player response behind a browser-looking client.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Title-cases a string the way playlist group titles are conventionally
/// written: first letter of every alphabetic run uppercased, the rest
/// lowercased (`"sri lanka"` -> `"Sri Lanka"`).
#[must_use]
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;

    for c in input.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }

    out
}

#[must_use]
pub fn init_http_client() -> reqwest::Client {
    let mut headers = HeaderMap::new();
    headers.insert("User-Agent", HeaderValue::from_static(BROWSER_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("Unable to build HTTP client")
}

/// Spawn a task that watches for CTRL + C signal and cancels a [`CancellationToken`] when caught
pub fn spawn_ct_watcher(ct: CancellationToken) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Caught CTRL+C signal!");
        ct.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::title_case;

    #[test]
    fn title_cases_each_word() {
        assert_eq!(title_case("sri lanka"), "Sri Lanka");
        assert_eq!(title_case("NEWS"), "News");
        assert_eq!(title_case("kids & family"), "Kids & Family");
    }

    #[test]
    fn leaves_empty_and_non_alphabetic_alone() {
        assert_eq!(title_case(""), "");
        assert_eq!(title_case("24/7"), "24/7");
    }
}

use std::{
    io::Write as _,
    process::Stdio,
    sync::{Arc, LazyLock},
};

use anyhow::{Context, Result, bail, ensure};
use async_trait::async_trait;
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::util::{BROWSER_USER_AGENT, init_http_client};

/// The opaque stream-extraction capability: given a channel page URL, either
/// return a directly playable stream URL or fail.
///
/// Implementations do not retry or apply URL variants - that is the
/// resolver's job.
#[async_trait]
pub trait StreamExtractor: Send + Sync {
    /// Backend name, for logging only
    fn name(&self) -> &'static str;

    /// # Errors
    /// Errors on network/site failure or when the page carries no live stream
    async fn extract(&self, channel_url: &str) -> Result<String>;
}

/// Which extraction backend to resolve streams with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExtractorMode {
    /// The `yt-dlp` binary (best success rate, supports cookies)
    YtDlp,
    /// Plain HTTPS fetch of the channel page
    Web,
    /// `yt-dlp` when installed, otherwise the web backend
    #[default]
    Auto,
}

/// Extraction backed by the `yt-dlp` binary.
pub struct YtDlpExtractor {
    /// Cookie-jar contents (cookies.txt format), written to a transient file
    /// for the duration of one extraction attempt
    cookies: Option<String>,
    socket_timeout_secs: u64,
}

impl YtDlpExtractor {
    #[must_use]
    pub const fn new(cookies: Option<String>, socket_timeout_secs: u64) -> Self {
        Self {
            cookies,
            socket_timeout_secs,
        }
    }

    /// Checks if yt-dlp is installed / available in PATH
    pub async fn is_installed() -> bool {
        tokio::process::Command::new("yt-dlp")
            .arg("--version")
            .stderr(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .map_or(false, |status| status.success())
    }

    /// Materializes the cookie blob as a temp file yt-dlp can read. The file
    /// is removed when the returned handle drops, at the end of the attempt.
    fn write_cookie_jar(&self) -> Result<Option<NamedTempFile>> {
        let Some(cookies) = &self.cookies else {
            return Ok(None);
        };

        let mut jar = NamedTempFile::new().context("Creating cookie jar file")?;
        jar.write_all(cookies.as_bytes())
            .context("Writing cookie jar contents")?;
        jar.flush().context("Flushing cookie jar file")?;

        Ok(Some(jar))
    }
}

#[async_trait]
impl StreamExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    #[instrument(skip(self))]
    async fn extract(&self, channel_url: &str) -> Result<String> {
        let cookie_jar = self.write_cookie_jar()?;

        let mut command = tokio::process::Command::new("yt-dlp");
        command.args([
            "--quiet",
            "--no-warnings",
            "--geo-bypass",
            "--format",
            "best",
            "--get-url",
            "--socket-timeout",
            &self.socket_timeout_secs.to_string(),
            "--user-agent",
            BROWSER_USER_AGENT,
        ]);
        if let Some(jar) = &cookie_jar {
            command.arg("--cookies").arg(jar.path());
        }

        let output = command
            .arg(channel_url)
            .stdin(Stdio::null())
            .output()
            .await
            .context("Spawning yt-dlp")?;

        ensure!(
            output.status.success(),
            "yt-dlp exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(url) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
            bail!("yt-dlp returned no stream URL");
        };

        Ok(url.to_string())
    }
}

static HLS_MANIFEST_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""hlsManifestUrl":"([^"]+)""#).unwrap());

/// Extraction via a plain HTTPS fetch of the channel page, picking the HLS
/// manifest URL out of the embedded player response. Works without any
/// external binary but only for channels that are live right now.
pub struct WebPageExtractor {
    client: reqwest::Client,
}

impl WebPageExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: init_http_client(),
        }
    }
}

impl Default for WebPageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamExtractor for WebPageExtractor {
    fn name(&self) -> &'static str {
        "web"
    }

    #[instrument(skip(self))]
    async fn extract(&self, channel_url: &str) -> Result<String> {
        let req = self
            .client
            .get(channel_url)
            .send()
            .await
            .context("Fetching channel page")?;

        ensure!(
            req.status().is_success(),
            "Channel page returned status {}",
            req.status()
        );

        let body = req.text().await.context("Decoding channel page")?;
        let Some(captures) = HLS_MANIFEST_URL_REGEX.captures(&body) else {
            bail!("Channel page carries no hlsManifestUrl; channel is likely not live");
        };

        // The URL sits inside a JSON string literal
        Ok(captures[1].replace("\\u0026", "&").replace("\\/", "/"))
    }
}

/// Picks the extraction backend for `mode`, probing for yt-dlp when `Auto`.
pub async fn select_extractor(
    mode: ExtractorMode,
    cookies: Option<String>,
    socket_timeout_secs: u64,
) -> Arc<dyn StreamExtractor> {
    match mode {
        ExtractorMode::YtDlp => Arc::new(YtDlpExtractor::new(cookies, socket_timeout_secs)),
        ExtractorMode::Web => Arc::new(WebPageExtractor::new()),
        ExtractorMode::Auto => {
            if YtDlpExtractor::is_installed().await {
                debug!("yt-dlp found in PATH");
                Arc::new(YtDlpExtractor::new(cookies, socket_timeout_secs))
            } else {
                info!("yt-dlp is not installed, falling back to page extraction");
                Arc::new(WebPageExtractor::new())
            }
        }
    }
}

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indoc::indoc;

use crate::{channels::ChannelInfo, util::title_case};

/// EPG index referenced from the playlist header by default.
pub const DEFAULT_EPG_URL: &str =
    "https://github.com/botallen/epg/releases/download/latest/epg.xml";

/// Channels whose streams are plain static URLs, appended to every playlist
/// verbatim.
const STATIC_TAIL: &str = indoc! {r#"

    #EXTM3U
    #EXTINF:-1 tvg-id="HiruTV" tvg-name="Hiru TV" tvg-logo="https://www.hirutv.lk/assets/images/logo.png" group-title="Sri Lanka",Hiru TV
    https://tv.hiruhost.com:1936/8012/8012/playlist.m3u8

    #EXTINF:-1 tvg-id="SiyathaTV" tvg-name="Siyatha TV" tvg-logo="https://voaplus.com/images/siyathatv-logo.jpg" group-title="Sri Lanka",Siyatha TV
    https://rtmp01.voaplus.com/hls/6x6ik312qk4grfxocfcv_high/index.m3u8

    #EXTINF:-1 tvg-id="Swarnawahini" tvg-name="Swarnawahini" tvg-logo="https://www.swarnavahini.lk/Uploads/logo.png" group-title="Sri Lanka",Swarnawahini
    https://jk3lz8xklw79-hls-live.5centscdn.com/live/6226f7cbe59e99a90b5cef6f94f966fd.sdp/playlist.m3u8
"#};

/// Writes the `#EXTM3U` header directive and the refresh timestamp comment.
///
/// # Errors
/// Errors when the playlist target cannot be written.
pub fn write_header(out: &mut impl Write, epg_url: &str, now: DateTime<Utc>) -> Result<()> {
    writeln!(out, "#EXTM3U x-tvg-url=\"{epg_url}\"").context("Writing playlist header")?;
    writeln!(out, "# Refreshed at {} UTC", now.format("%Y-%m-%d %H:%M:%S"))
        .context("Writing refresh timestamp")?;

    Ok(())
}

/// Writes the `#EXTINF` metadata directive preceding a channel's stream URL.
/// The group title is title-cased; other fields pass through unchanged.
///
/// # Errors
/// Errors when the playlist target cannot be written.
pub fn write_channel_info(out: &mut impl Write, info: &ChannelInfo) -> Result<()> {
    writeln!(out).context("Writing channel separator")?;
    writeln!(
        out,
        "#EXTINF:-1 group-title=\"{}\" tvg-logo=\"{}\" tvg-id=\"{}\", {}",
        title_case(&info.group),
        info.logo,
        info.epg_id,
        info.name
    )
    .context("Writing channel metadata")?;

    Ok(())
}

/// Writes a channel's chosen stream URL (or the placeholder) on its own line.
///
/// # Errors
/// Errors when the playlist target cannot be written.
pub fn write_stream_url(out: &mut impl Write, url: &str) -> Result<()> {
    writeln!(out, "{url}").context("Writing stream URL")?;
    Ok(())
}

/// Appends the fixed block of static channel entries.
///
/// # Errors
/// Errors when the playlist target cannot be written.
pub fn write_static_tail(out: &mut impl Write) -> Result<()> {
    out.write_all(STATIC_TAIL.as_bytes())
        .context("Writing static channel entries")?;
    Ok(())
}

//! Field normalization: turns a loosely-formatted [`FeedItem`] into a
//! typed, storage-ready episode record.
//!
//! Everything here is best-effort by policy. A bad date becomes "now", a
//! bad duration becomes 0 minutes, a title with no recognizable numbering
//! falls back to season 1 / episode 0. An otherwise-usable episode is never
//! rejected over one unparsable sub-field.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use super::parser::FeedItem;

/// Storage-shaped episode record produced from one feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEpisode {
    pub guid: String,
    pub title: String,
    /// HTML-stripped plain text.
    pub description: String,
    pub audio_url: String,
    pub published_date: DateTime<Utc>,
    /// Original duration string, retained for display.
    pub duration: String,
    pub duration_minutes: i64,
    pub cover_image: String,
    pub season: i64,
    /// 0 means the title carried no recognizable episode number.
    pub episode: i64,
    /// Always false for synced items; manually staged previews are the only
    /// records that ever set it.
    pub is_preview: bool,
    pub imported_at: DateTime<Utc>,
}

static SEASON_EPISODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)S(\d+)E(\d+)").expect("season/episode pattern"));
static SEASON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Season\s+(\d+)").expect("season pattern"));
static EPISODE_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Episode\s+(\d+)").expect("episode pattern"));
static EPISODE_ABBREV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Ep\.?\s*(\d+)").expect("episode pattern"));
static EPISODE_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)").expect("episode pattern"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));

/// Map a feed item to a normalized episode.
///
/// `now` is the run timestamp: it becomes `imported_at` and substitutes for
/// absent or unparsable publication dates, so an undated item is treated as
/// freshly published rather than dropped.
pub fn normalize(item: FeedItem, now: DateTime<Utc>, default_cover_image: &str) -> NormalizedEpisode {
    NormalizedEpisode {
        guid: item.guid,
        season: extract_season(&item.title),
        episode: extract_episode(&item.title),
        title: item.title,
        description: strip_html(&item.description),
        audio_url: item.enclosure_url,
        published_date: parse_pub_date(item.pub_date.as_deref(), now),
        duration_minutes: duration_to_minutes(&item.duration),
        duration: item.duration,
        cover_image: item
            .cover_image
            .unwrap_or_else(|| default_cover_image.to_string()),
        is_preview: false,
        imported_at: now,
    }
}

/// Convert an `H:MM:SS`, `MM:SS` or bare-seconds duration string to whole
/// minutes, rounding seconds half-up. Non-numeric or empty input yields 0.
pub fn duration_to_minutes(duration: &str) -> i64 {
    let trimmed = duration.trim();
    if trimmed.is_empty() {
        return 0;
    }

    let parts: Option<Vec<i64>> = trimmed
        .split(':')
        .map(|p| p.trim().parse::<i64>().ok())
        .collect();
    let Some(parts) = parts else {
        return 0;
    };
    if parts.iter().any(|p| *p < 0) {
        return 0;
    }

    match parts.as_slice() {
        [hours, minutes, seconds] => hours
            .saturating_mul(60)
            .saturating_add(*minutes)
            .saturating_add(round_seconds(*seconds)),
        [minutes, seconds] => minutes.saturating_add(round_seconds(*seconds)),
        [seconds] => round_seconds(*seconds),
        _ => 0,
    }
}

fn round_seconds(seconds: i64) -> i64 {
    seconds.saturating_add(30) / 60
}

/// Pull the season number out of a title, defaulting to 1.
///
/// The layered patterns track how the show's title conventions have changed
/// over its history: `S2E5` early on, `Season 2` later.
pub fn extract_season(title: &str) -> i64 {
    SEASON_EPISODE_RE
        .captures(title)
        .or_else(|| SEASON_WORD_RE.captures(title))
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(1)
}

/// Pull the episode number out of a title, defaulting to 0 (the "unknown
/// episode number" sentinel, not an error).
pub fn extract_episode(title: &str) -> i64 {
    SEASON_EPISODE_RE
        .captures(title)
        .and_then(|c| c.get(2))
        .or_else(|| EPISODE_WORD_RE.captures(title).and_then(|c| c.get(1)))
        .or_else(|| EPISODE_ABBREV_RE.captures(title).and_then(|c| c.get(1)))
        .or_else(|| EPISODE_HASH_RE.captures(title).and_then(|c| c.get(1)))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Parse the feed's publication date. RSS dates are RFC 2822; some hosting
/// providers emit RFC 3339 instead. Anything else becomes `now`.
pub fn parse_pub_date(pub_date: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = pub_date else {
        return now;
    };
    let raw = raw.trim();

    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return date.with_timezone(&Utc);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return date.with_timezone(&Utc);
    }
    now
}

/// Remove markup and decode the entity set the upstream feed actually uses.
///
/// Not a general HTML-entity decoder: the six entities below are the ones
/// the publisher's editor emits into descriptions.
pub fn strip_html(html: &str) -> String {
    TAG_RE
        .replace_all(html, "")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .trim()
        .to_string()
}

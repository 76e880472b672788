//! Channel-id inference from the free-form values stored in the roster.
//!
//! All functions are pure and return `None` when nothing usable is found.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static CHANNEL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[0-9A-Za-z_-]{22}$").unwrap());

static CHANNEL_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.|m\.)?youtube\.com/channel/(UC[0-9A-Za-z_-]{22})(?:[/?#]|$)")
        .unwrap()
});

static HANDLE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.|m\.)?youtube\.com/(@[0-9A-Za-z_.-]{3,30})(?:[/?#]|$)")
        .unwrap()
});

const FEED_URL: &str = "https://www.youtube.com/xml/feeds/videos.xml";

/// The hub topic for a channel's upload feed.
pub fn topic_url(channel_id: &str) -> String {
    format!("{FEED_URL}?channel_id={channel_id}")
}

/// Extract the `channel_id` query parameter from a feed topic URL.
pub fn channel_id_from_topic(topic: &str) -> Option<String> {
    let url = Url::parse(topic.trim()).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "channel_id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| CHANNEL_ID_REGEX.is_match(id))
}

/// Infer a channel id from a bare id, a `/channel/` URL, or a topic URL.
///
/// Handle URLs (`youtube.com/@name`) cannot be resolved offline and yield `None`.
pub fn infer_channel_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if CHANNEL_ID_REGEX.is_match(input) {
        return Some(input.to_string());
    }

    if let Some(caps) = CHANNEL_URL_REGEX.captures(input) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }

    channel_id_from_topic(input)
}

/// Extract an `@handle` from a channel URL.
pub fn handle_from_url(input: &str) -> Option<String> {
    HANDLE_URL_REGEX
        .captures(input.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

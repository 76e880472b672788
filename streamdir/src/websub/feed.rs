//! Atom notification bodies pushed by the hub.

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::{Error, Result};

/// A published or updated video announced by the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub video_id: String,
    pub channel_id: Option<String>,
    pub title: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// A video removed from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedEntry {
    pub video_id: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Parsed notification body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    pub entries: Vec<FeedEntry>,
    pub deleted: Vec<DeletedEntry>,
}

impl Notification {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    VideoId,
    ChannelId,
    Title,
    Published,
    Updated,
}

/// Parse an Atom notification. Elements are matched by local name, so the
/// `yt:` and `at:` prefixes do not need to be bound to particular URIs.
pub fn parse_notification(body: &[u8]) -> Result<Notification> {
    let text = std::str::from_utf8(body)
        .map_err(|e| Error::validation(format!("notification is not UTF-8: {e}")))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut notification = Notification::default();
    let mut entry: Option<FeedEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"entry" => entry = Some(FeedEntry::default()),
                b"deleted-entry" => notification.deleted.extend(deleted_entry(&e)?),
                name if entry.is_some() => field = field_for(name),
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"deleted-entry" {
                    notification.deleted.extend(deleted_entry(&e)?);
                }
            }
            Event::Text(t) => {
                if let (Some(current), Some(f)) = (entry.as_mut(), field) {
                    let value = t.unescape().map_err(xml_error)?.trim().to_string();
                    apply(current, f, value);
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"entry"
                    && let Some(done) = entry.take()
                    && !done.video_id.is_empty()
                {
                    notification.entries.push(done);
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(notification)
}

fn field_for(local_name: &[u8]) -> Option<Field> {
    match local_name {
        b"videoId" => Some(Field::VideoId),
        b"channelId" => Some(Field::ChannelId),
        b"title" => Some(Field::Title),
        b"published" => Some(Field::Published),
        b"updated" => Some(Field::Updated),
        _ => None,
    }
}

fn apply(entry: &mut FeedEntry, field: Field, value: String) {
    match field {
        Field::VideoId => entry.video_id = value,
        Field::ChannelId => entry.channel_id = Some(value),
        Field::Title => entry.title = Some(value),
        Field::Published => entry.published = parse_timestamp(&value),
        Field::Updated => entry.updated = parse_timestamp(&value),
    }
}

/// `<at:deleted-entry ref="yt:video:ID" when="...">`
fn deleted_entry(e: &BytesStart<'_>) -> Result<Option<DeletedEntry>> {
    let mut reference = None;
    let mut when = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::validation(format!("bad XML attribute: {err}")))?;
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        match attr.key.local_name().as_ref() {
            b"ref" => reference = Some(value),
            b"when" => when = parse_timestamp(&value),
            _ => {}
        }
    }

    Ok(reference.map(|r| DeletedEntry {
        video_id: r.rsplit(':').next().unwrap_or_default().to_string(),
        deleted_at: when,
    }))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn xml_error(e: quick_xml::Error) -> Error {
    Error::validation(format!("malformed notification feed: {e}"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const PUBLISHED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns="http://www.w3.org/2005/Atom">
  <link rel="hub" href="https://pubsubhubbub.appspot.com"/>
  <title>YouTube video feed</title>
  <updated>2024-05-01T12:00:10.000000+00:00</updated>
  <entry>
    <id>yt:video:live123</id>
    <yt:videoId>live123</yt:videoId>
    <yt:channelId>UCabcdefghijklmnopqrstuv</yt:channelId>
    <title>Morning stream &amp; chat</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=live123"/>
    <author>
      <name>Sample</name>
      <uri>https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv</uri>
    </author>
    <published>2024-05-01T12:00:00+00:00</published>
    <updated>2024-05-01T12:00:10.000000+00:00</updated>
  </entry>
</feed>"#;

    const DELETED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:at="http://purl.org/atompub/tombstones/1.0" xmlns="http://www.w3.org/2005/Atom">
  <at:deleted-entry ref="yt:video:gone456" when="2024-05-02T08:00:00+00:00">
    <link href="https://www.youtube.com/watch?v=gone456"/>
    <at:by>
      <name>Sample</name>
    </at:by>
  </at:deleted-entry>
</feed>"#;

    #[test]
    fn test_parse_published_entry() {
        let notification = parse_notification(PUBLISHED.as_bytes()).unwrap();
        assert_eq!(notification.entries.len(), 1);
        assert!(notification.deleted.is_empty());

        let entry = &notification.entries[0];
        assert_eq!(entry.video_id, "live123");
        assert_eq!(entry.channel_id.as_deref(), Some("UCabcdefghijklmnopqrstuv"));
        assert_eq!(entry.title.as_deref(), Some("Morning stream & chat"));
        assert_eq!(
            entry.published,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
        assert!(entry.updated.is_some());
    }

    #[test]
    fn test_parse_deleted_entry() {
        let notification = parse_notification(DELETED.as_bytes()).unwrap();
        assert!(notification.entries.is_empty());
        assert_eq!(
            notification.deleted,
            vec![DeletedEntry {
                video_id: "gone456".into(),
                deleted_at: Some(Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()),
            }]
        );
    }

    #[test]
    fn test_feed_title_is_not_an_entry() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>only a title</title></feed>"#;
        let notification = parse_notification(body.as_bytes()).unwrap();
        assert!(notification.is_empty());
    }

    #[test]
    fn test_malformed_feed_is_rejected() {
        let body = "<feed><entry><yt:videoId>x</yt:videoId></feed>";
        assert!(matches!(
            parse_notification(body.as_bytes()),
            Err(Error::Validation(_))
        ));
        assert!(parse_notification(&[0xff, 0xfe]).is_err());
    }
}

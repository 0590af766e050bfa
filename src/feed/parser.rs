//! Tolerant extraction of episode items from the raw feed text.
//!
//! This is deliberately not a conforming XML parser. The upstream feed
//! is the only document we ever read, and hosting providers have shipped it
//! with broken namespace declarations and stray markup between items. The
//! extractor scans for `<item>` segments and pulls fields out of each one
//! by pattern, so malformed markup elsewhere in the document can never
//! abort a sync. Fields published both CDATA-wrapped and plain are read in
//! CDATA-preferred order.

use regex::Regex;
use std::sync::LazyLock;

/// One entry extracted from the feed document.
///
/// `guid`, `title` and `enclosure_url` are the identification minimum; an
/// item lacking any of them is dropped during extraction (trailers without
/// media, placeholder entries). `description` keeps its raw markup; the
/// normalizer strips it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub guid: String,
    pub title: String,
    pub description: String,
    pub pub_date: Option<String>,
    pub enclosure_url: String,
    pub duration: String,
    pub cover_image: Option<String>,
}

/// Extraction output: the usable items in document order, plus how many
/// segments were dropped for lacking an identity or an enclosure.
#[derive(Debug)]
pub struct ParsedFeed {
    pub items: Vec<FeedItem>,
    pub skipped: usize,
}

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item[^>]*>(.*?)</item>").expect("item pattern"));
static GUID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<guid[^>]*>([^<]+)</guid>").expect("guid pattern"));
static TITLE_CDATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title><!\[CDATA\[(.*?)\]\]></title>").expect("title pattern"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>([^<]+)</title>").expect("title pattern"));
static DESCRIPTION_CDATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<description><!\[CDATA\[(.*?)\]\]></description>").expect("description pattern")
});
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<description>(.*?)</description>").expect("description pattern")
});
static PUB_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<pubDate>([^<]+)</pubDate>").expect("pubDate pattern"));
static ENCLOSURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<enclosure[^>]*url="([^"]+)""#).expect("enclosure pattern"));
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<itunes:duration>([^<]+)</itunes:duration>").expect("duration pattern")
});
static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<itunes:image[^>]*href="([^"]+)""#).expect("image pattern"));

/// Extract episode items from the raw feed text, preserving document order.
///
/// Lossy by design: segments without `guid`, `title` or `enclosure` are
/// counted in `skipped` rather than reported as errors. Duplicate guids
/// within one document are all kept; reconciliation processes them in
/// order, so the last occurrence determines the persisted state.
pub fn parse_feed(text: &str) -> ParsedFeed {
    let mut items = Vec::new();
    let mut skipped = 0;

    for segment in ITEM_RE.captures_iter(text) {
        let item_xml = &segment[1];

        let guid = first_capture(&GUID_RE, item_xml);
        let title =
            first_capture(&TITLE_CDATA_RE, item_xml).or_else(|| first_capture(&TITLE_RE, item_xml));
        let enclosure_url = first_capture(&ENCLOSURE_RE, item_xml);

        let (Some(guid), Some(title), Some(enclosure_url)) = (guid, title, enclosure_url) else {
            skipped += 1;
            continue;
        };

        let description = first_capture(&DESCRIPTION_CDATA_RE, item_xml)
            .or_else(|| first_capture(&DESCRIPTION_RE, item_xml))
            .unwrap_or_default();

        items.push(FeedItem {
            guid,
            title,
            description,
            pub_date: first_capture(&PUB_DATE_RE, item_xml),
            enclosure_url,
            duration: first_capture(&DURATION_RE, item_xml)
                .unwrap_or_else(|| "00:00".to_string()),
            cover_image: first_capture(&IMAGE_RE, item_xml),
        });
    }

    ParsedFeed { items, skipped }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(body: &str) -> String {
        format!("<rss><channel><item>{}</item></channel></rss>", body)
    }

    const FULL_ITEM: &str = r#"
        <guid isPermaLink="false">ep-001</guid>
        <title><![CDATA[S1E1 The Beginning]]></title>
        <description><![CDATA[<p>Welcome to the <b>show</b></p>]]></description>
        <pubDate>Mon, 06 Jan 2025 08:00:00 GMT</pubDate>
        <enclosure url="https://cdn.example.com/ep1.mp3" length="1234" type="audio/mpeg"/>
        <itunes:duration>1:02:30</itunes:duration>
        <itunes:image href="https://cdn.example.com/ep1.jpg"/>
    "#;

    #[test]
    fn test_extracts_all_fields() {
        let parsed = parse_feed(&item(FULL_ITEM));
        assert_eq!(parsed.skipped, 0);
        assert_eq!(
            parsed.items,
            vec![FeedItem {
                guid: "ep-001".to_string(),
                title: "S1E1 The Beginning".to_string(),
                description: "<p>Welcome to the <b>show</b></p>".to_string(),
                pub_date: Some("Mon, 06 Jan 2025 08:00:00 GMT".to_string()),
                enclosure_url: "https://cdn.example.com/ep1.mp3".to_string(),
                duration: "1:02:30".to_string(),
                cover_image: Some("https://cdn.example.com/ep1.jpg".to_string()),
            }]
        );
    }

    #[test]
    fn test_item_without_guid_is_dropped_silently() {
        let xml = item(
            r#"<title>No Guid</title>
               <enclosure url="https://cdn.example.com/a.mp3"/>"#,
        );
        let parsed = parse_feed(&xml);
        assert!(parsed.items.is_empty());
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_item_without_enclosure_is_dropped_silently() {
        let xml = item("<guid>g1</guid><title>Trailer announcement</title>");
        let parsed = parse_feed(&xml);
        assert!(parsed.items.is_empty());
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_missing_optional_fields_get_defaults() {
        let xml = item(
            r#"<guid>g1</guid>
               <title>Bare Minimum</title>
               <enclosure url="https://cdn.example.com/a.mp3"/>"#,
        );
        let parsed = parse_feed(&xml);
        let item = &parsed.items[0];
        assert_eq!(item.description, "");
        assert_eq!(item.pub_date, None);
        assert_eq!(item.duration, "00:00");
        assert_eq!(item.cover_image, None);
    }

    #[test]
    fn test_cdata_title_preferred_over_plain() {
        // Some feed generators emit both forms; CDATA is the one the
        // publisher actually typed.
        let xml = item(
            r#"<guid>g1</guid>
               <title><![CDATA[Real & Title]]></title>
               <title>Escaped Title</title>
               <enclosure url="https://cdn.example.com/a.mp3"/>"#,
        );
        let parsed = parse_feed(&xml);
        assert_eq!(parsed.items[0].title, "Real & Title");
    }

    #[test]
    fn test_document_order_preserved() {
        let xml = "<rss><channel>\
             <item><guid>a</guid><title>A</title><enclosure url=\"https://e/a.mp3\"/></item>\
             <item><guid>b</guid><title>B</title><enclosure url=\"https://e/b.mp3\"/></item>\
             <item><guid>c</guid><title>C</title><enclosure url=\"https://e/c.mp3\"/></item>\
             </channel></rss>";
        let parsed = parse_feed(xml);
        let guids: Vec<&str> = parsed.items.iter().map(|i| i.guid.as_str()).collect();
        assert_eq!(guids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_guids_all_kept() {
        // Dedup is the reconciler's job; last occurrence wins there.
        let xml = "<rss><channel>\
             <item><guid>dup</guid><title>First</title><enclosure url=\"https://e/1.mp3\"/></item>\
             <item><guid>dup</guid><title>Second</title><enclosure url=\"https://e/2.mp3\"/></item>\
             </channel></rss>";
        let parsed = parse_feed(xml);
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[1].title, "Second");
    }

    #[test]
    fn test_malformed_markup_outside_items_is_ignored() {
        let xml = format!(
            "<rss><channel><atom:link href=oops <<<garbage>>> {} </channel>",
            item(FULL_ITEM)
        );
        let parsed = parse_feed(&xml);
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].guid, "ep-001");
    }

    #[test]
    fn test_valid_items_survive_one_invalid_sibling() {
        let xml = "<rss><channel>\
             <item><guid>a</guid><title>A</title><enclosure url=\"https://e/a.mp3\"/></item>\
             <item><title>No audio yet</title></item>\
             <item><guid>b</guid><title>B</title><enclosure url=\"https://e/b.mp3\"/></item>\
             </channel></rss>";
        let parsed = parse_feed(xml);
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_empty_document_yields_no_items() {
        let parsed = parse_feed("not xml at all");
        assert!(parsed.items.is_empty());
        assert_eq!(parsed.skipped, 0);
    }
}

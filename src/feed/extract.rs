use chrono::{Local, NaiveDateTime, SubsecRound, Timelike, Weekday};

use super::types::{FeedItem, ItemField, Record, SENTINEL};

/// Characters of `pubDate` considered for reformatting; the rest
/// (timezone offset or name) is ignored.
const PUB_DATE_PREFIX_CHARS: usize = 25;

/// `pubDate` layout after the `"<weekday>, "` prefix.
const PUB_DATE_LAYOUT: &str = "%d %b %Y %H:%M:%S";

const FORMATTED_DATE_LAYOUT: &str = "%d/%m/%Y %H:%M:%S";

/// Builds a [`Record`] from `item`, stamped with the current local time.
///
/// The stamp is truncated to whole seconds, the precision it is exported at.
pub fn extract(item: &FeedItem) -> Record {
    extract_at(item, Local::now().naive_local().trunc_subsecs(0))
}

/// Builds a [`Record`] from `item` with an explicit extraction time.
///
/// Never fails: missing fields become [`SENTINEL`] and an unreadable
/// `pubDate` is carried over verbatim as the formatted date.
pub fn extract_at(item: &FeedItem, extracted_at: NaiveDateTime) -> Record {
    let field = |f: ItemField| item.get(f).unwrap_or(SENTINEL).to_string();

    let formatted_date = match item.get(ItemField::PubDate) {
        Some(raw) => format_pub_date(raw),
        None => SENTINEL.to_string(),
    };

    Record {
        title: field(ItemField::Title),
        link: field(ItemField::Link),
        description: field(ItemField::Description),
        publication_date: field(ItemField::PubDate),
        formatted_date,
        category: field(ItemField::Category),
        guid: field(ItemField::Guid),
        extracted_at,
    }
}

/// Extracts every item in document order.
pub fn extract_all(items: &[FeedItem]) -> Vec<Record> {
    items.iter().map(extract).collect()
}

/// Reformats an RFC 822 style date as `dd/mm/yyyy HH:MM:SS`.
///
/// Only the first 25 characters are parsed, which covers
/// `"Wed, 08 Aug 2025 10:30:00"` and drops the offset. The weekday must be a
/// valid abbreviation but is not checked against the date. Anything that does
/// not fit comes back unchanged.
///
/// ```
/// use feedscrape::feed::format_pub_date;
///
/// assert_eq!(format_pub_date("Wed, 08 Aug 2025 10:30:00 -0300"), "08/08/2025 10:30:00");
/// assert_eq!(format_pub_date("2025-08-08T10:30:00Z"), "2025-08-08T10:30:00Z");
/// ```
pub fn format_pub_date(raw: &str) -> String {
    parse_pub_date(raw)
        .map(|dt| dt.format(FORMATTED_DATE_LAYOUT).to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn parse_pub_date(raw: &str) -> Option<NaiveDateTime> {
    let end = raw
        .char_indices()
        .nth(PUB_DATE_PREFIX_CHARS)
        .map_or(raw.len(), |(idx, _)| idx);
    let head = &raw[..end];

    let (weekday, rest) = head.split_once(", ")?;
    if weekday.len() != 3 || weekday.parse::<Weekday>().is_err() {
        return None;
    }

    // chrono reads second 60 as a leap second; the layout does not allow it.
    NaiveDateTime::parse_from_str(rest, PUB_DATE_LAYOUT)
        .ok()
        .filter(|dt| dt.nanosecond() < 1_000_000_000)
}

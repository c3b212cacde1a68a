use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Placeholder written for any field the feed does not supply.
///
/// Keeps every exported row at the full column count.
pub const SENTINEL: &str = "N/A";

/// Layout of [`Record::extracted_at`] in exports and on the console.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Feed Items
// ============================================================================

/// The child elements of an `<item>` that the extractor looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemField {
    Title,
    Link,
    Description,
    PubDate,
    Category,
    Guid,
}

impl ItemField {
    pub const ALL: [ItemField; 6] = [
        ItemField::Title,
        ItemField::Link,
        ItemField::Description,
        ItemField::PubDate,
        ItemField::Category,
        ItemField::Guid,
    ];

    /// Element name as it appears in the feed.
    pub fn tag_name(self) -> &'static str {
        match self {
            ItemField::Title => "title",
            ItemField::Link => "link",
            ItemField::Description => "description",
            ItemField::PubDate => "pubDate",
            ItemField::Category => "category",
            ItemField::Guid => "guid",
        }
    }

    /// Matches an unprefixed element name; `media:title` and friends are not item fields.
    pub fn from_tag(name: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.tag_name().as_bytes() == name)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// One `<item>` element, reduced to the text of its known children.
///
/// Only the first direct child of each kind is kept. A child that is missing
/// or carries no text reads as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    fields: [Option<String>; 6],
}

impl FeedItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: ItemField) -> Option<&str> {
        self.fields[field.index()].as_deref()
    }

    pub fn set(&mut self, field: ItemField, text: impl Into<String>) {
        self.fields[field.index()] = Some(text.into());
    }

    /// Builder-style [`set`](Self::set), mostly for tests.
    pub fn with(mut self, field: ItemField, text: impl Into<String>) -> Self {
        self.set(field, text);
        self
    }
}

// ============================================================================
// Records
// ============================================================================

/// A flat, exportable view of one feed item.
///
/// Every text field is populated; absent values hold [`SENTINEL`]. Serialized
/// field names are the ones used in the export files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "titulo")]
    pub title: String,
    pub link: String,
    #[serde(rename = "descricao")]
    pub description: String,
    /// `pubDate` exactly as the feed wrote it.
    #[serde(rename = "data_publicacao")]
    pub publication_date: String,
    /// `dd/mm/yyyy HH:MM:SS`, or `publication_date` verbatim if it did not parse.
    #[serde(rename = "data_formatada")]
    pub formatted_date: String,
    #[serde(rename = "categoria")]
    pub category: String,
    pub guid: String,
    /// Local wall-clock time the record was built, not the publication time.
    #[serde(rename = "extraido_em", with = "timestamp")]
    pub extracted_at: NaiveDateTime,
}

impl Record {
    pub fn extracted_at_string(&self) -> String {
        self.extracted_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

mod timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

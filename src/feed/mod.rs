//! Feed retrieval and item extraction.
//!
//! The first three pipeline stages live here:
//!
//! - [`fetcher`] - one HTTP GET with a fixed user agent, timeout and size cap
//! - [`parser`] - well-formedness check and `<item>` collection via `quick-xml`
//! - [`extract`] - item to [`Record`] mapping with sentinel fill and date reformatting
//!
//! # Example
//!
//! ```
//! use feedscrape::feed::{extract_all, parse};
//!
//! let items = parse("<rss><channel><item><title>Test</title></item></channel></rss>").unwrap();
//! let records = extract_all(&items);
//! assert_eq!(records[0].title, "Test");
//! assert_eq!(records[0].category, "N/A");
//! ```

mod extract;
mod fetcher;
mod parser;
mod types;

pub use extract::{extract, extract_all, extract_at, format_pub_date};
pub use fetcher::{build_client, fetch, FetchError};
pub use parser::{parse, ParseError};
pub use types::{FeedItem, ItemField, Record, SENTINEL, TIMESTAMP_FORMAT};

//! Fetches an RSS feed, reduces each `<item>` to a flat [`feed::Record`] and
//! exports the records as CSV and JSON.
//!
//! The stages run strictly in sequence: [`feed::fetch`] → [`feed::parse`] →
//! [`feed::extract_all`] → [`export`]. [`pipeline::Pipeline`] wires them
//! together from a [`config::Config`] and adds the console reports and the
//! monitor loop.

pub mod config;
pub mod export;
pub mod feed;
pub mod pipeline;
pub mod util;

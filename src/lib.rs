//! Keeps a podcast site's episode table in sync with its published RSS feed.
//!
//! One sync run is a linear pipeline: fetch the feed document, extract items
//! ([`feed::parser`]), normalize their fields ([`feed::normalize`]), then
//! reconcile against the episodes table by guid ([`sync`]). The HTTP surface
//! in [`server`] exposes the trigger endpoint and the read API the website
//! consumes.

pub mod config;
pub mod feed;
pub mod server;
pub mod storage;
pub mod sync;

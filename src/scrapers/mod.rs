//! Scrapers built on top of [`crate::fetcher::Fetcher`].
//!
//! | Module | Input | Output |
//! |--------|-------|--------|
//! | [`page`] | any HTML page | [`PageSummary`](crate::models::PageSummary) |
//! | [`article`] | an article page | [`Article`](crate::models::Article) |
//! | [`feeds`] | RSS XML, or a page listing feeds | [`FeedItem`](crate::models::FeedItem) / [`FeedSource`](crate::models::FeedSource) |
//! | [`search`] | a search query | [`SearchResult`](crate::models::SearchResult) |
//!
//! Every scraper has a pure half working on a string already in hand and an
//! async half that fetches first. The async collection functions never fail:
//! errors are logged and turn into empty results.

pub mod article;
pub mod feeds;
pub mod page;
pub mod search;

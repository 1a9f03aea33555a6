//! TrendTool - A headline aggregator
//!
//! This crate collects recent headlines from two news-agency searches and a
//! mirrored social feed, translates the titles, and serves them as cards.

pub mod aggregator;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod fetcher;
pub mod routes;
pub mod sources;
pub mod translate;

//! Portfolio Feed - the data service behind a personal portfolio site
//!
//! This crate fetches the author's Substack RSS feed and reshapes it into a
//! small JSON list for display, alongside the curated reading list.

pub mod config;
pub mod feed;
pub mod routes;

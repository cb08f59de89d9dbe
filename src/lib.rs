//! Data layer for a movie browser backed by the OMDb API: a remote client,
//! a local SQLite library with live (subscription-based) queries, and a
//! repository that reconciles the two with upsert-by-title, actor dedup,
//! seed loading, and duplicate cleanup. Presentation layers drive it
//! through the state-machine flows in [`flows`].

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod flows;
pub mod omdb;
pub mod repo;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

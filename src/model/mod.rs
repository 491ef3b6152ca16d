//! Data model.
//!
//! - [`db`]: documents as stored in MongoDB.
//! - [`api`]: request and response bodies.
//! - [`common`]: enums shared by both.
//! - [`mongodb`]: collections, IDs and the MongoDB-backed store.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;

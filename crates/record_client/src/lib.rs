//! Record-store Data API client.
//!
//! This crate is the single source of truth for the store's wire
//! contract: session login, the `_find` query dialect, record CRUD,
//! and the "no records match" quirk.
//!
//! No GUI concepts. No retries. No caching.

mod client;
mod session;

pub use client::ApiClient;
pub use session::{delete_session, load_session, save_session, session_file_path, SavedSession};

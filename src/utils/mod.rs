//! Utility modules supporting metadata resolution.
//!
//! - [`FetchClient`]: disguised HTTP GETs with identity rotation, pacing and
//!   short timeouts, plus per-call cookie sessions
//! - [`normalize`]: date extraction, cover URL repair, truncation and loose
//!   title equality
//! - [`isbn`]: ISBN cleanup and checksum validation
//! - [`deduplicate_records`]: caller-side duplicate removal
//!
//! # Normalization
//!
//! ```rust
//! use biblio_resolver::utils::normalize::{repair_cover_url, titles_match};
//!
//! assert_eq!(
//!     repair_cover_url("//img.example.com/x.jpg").as_deref(),
//!     Some("https://img.example.com/x.jpg")
//! );
//! assert!(titles_match("Harry Potter (7)", "harry potter7"));
//! ```

mod dedup;
mod fingerprint;
mod http;
pub mod isbn;
pub mod normalize;

pub use dedup::{deduplicate_records, find_duplicates, is_in_catalog, DuplicateStrategy};
pub use fingerprint::{default_profiles, BrowserProfile, Pacing, ProfilePool, Rotation};
pub use http::{FetchClient, FetchError, FetchSession, FetchSettings, RawResponse};

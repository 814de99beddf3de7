//! Mirror module for page fetching, extraction and persistence
//!
//! This module contains the core mirroring logic, including:
//! - HTTP fetching with bounded retries and exponential backoff
//! - Typed reference extraction from page content
//! - Content-addressed asset storage with single-flight downloads
//! - Structural reference rewriting
//! - Overall mirror orchestration

mod assets;
mod backoff;
mod coordinator;
mod extract;
mod fetcher;
mod rewrite;

pub use assets::{asset_filename, hash_bytes, Asset, AssetStore, DownloadError};
pub use backoff::{AttemptFailure, RetryDecision, RetryPolicy};
pub use coordinator::{plan_pages, run_mirror, MirrorResult, Orchestrator, Page, PageIndex};
pub use extract::{
    extract_references, Extraction, Extractor, Reference, ReferenceKind, Scope, SkippedReference,
};
pub use fetcher::{build_http_client, format_user_agent, FetchClient, FetchedResource};
pub use rewrite::rewrite_references;

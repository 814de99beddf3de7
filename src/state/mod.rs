//! State module for tracking mirror progress
//!
//! # Components
//!
//! - `PageStatus`: Tracks the status of individual pages through the mirror pipeline
//! - `AssetStatus`: Records whether an asset was stored, reused or is missing

mod asset_state;
mod page_state;

// Re-export main types
pub use asset_state::AssetStatus;
pub use page_state::PageStatus;

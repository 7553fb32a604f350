//! Incremental downloader for the Nautica chart catalog.
//!
//! [`sync::Syncer`] walks the paginated song listing, skips songs whose
//! watermark in `meta.json` is newer than their upload time and runs every
//! other song through [`pipeline::ItemPipeline`], which downloads the chart
//! archive and unpacks it into the uploader's directory.

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fs_util;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod sync;

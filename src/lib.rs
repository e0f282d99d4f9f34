//! # FGI - Fast Grep Indexer
//!
//! FGI is an offline file-content indexer that accelerates subsequent
//! regular-expression search across a directory tree. For every directory it
//! walks, it writes one sidecar index file (`._UG#_Store`) listing each
//! regular file together with a compact probabilistic fingerprint of the
//! file's byte n-gram content. A search tool that understands the format can
//! use the fingerprints to skip files that cannot possibly contain a query
//! pattern.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - Index file codec, incremental update engine, and tree driver
//! - [`walk`] - Directory cataloguing and layered ignore-file handling
//! - [`decompress`] - Archive and compressed-file member streams (option `-z`)
//! - [`utils`] - The n-gram Bloom fingerprinter and the binary sniffer
//! - [`output`] - Warnings, errors, per-file verbose lines, summary report
//!
//! ## Quick Start
//!
//! ```ignore
//! use fgi::index::build::index_tree;
//! use fgi::index::types::Config;
//! use std::path::Path;
//!
//! let config = Config::default();
//! let stats = index_tree(&config, Path::new("/path/to/tree"))?;
//! println!("{} files indexed", stats.num_files);
//! ```
//!
//! ## Fingerprints
//!
//! Each fingerprint packs eight Bloom filters, one per n-gram length 1..8,
//! into the bit planes of a single byte table. The table starts at 64 KiB and
//! is repeatedly folded in half while its measured noise stays below the
//! threshold selected by the accuracy setting, trading storage for precision.

pub mod decompress;
pub mod index;
pub mod output;
pub mod utils;
pub mod walk;

//! sempwatch extractor - Stream SEMP XML replies into tables.
//!
//! This crate turns the XML replies of a message broker's management
//! protocol (SEMP) into rows and columns in one forward pass, without
//! building a document tree. A declarative configuration says which element
//! marks a row, which tags become columns and which subtrees to skip.
//!
//! # Example
//!
//! ```
//! use sempwatch_extractor::{extract, ExtractionConfig};
//!
//! let reply = "<rpc-reply><rpc><show><queue><queues>\
//!     <queue><name>Q1</name><message-vpn>VPN1</message-vpn></queue>\
//!     </queues></queue></show></rpc></rpc-reply>";
//! let config = ExtractionConfig::targeted("queue", ["name", "message-vpn"]);
//!
//! let dataset = extract(reply, &config).unwrap();
//! assert_eq!(dataset.row_count(), 1);
//! assert!(dataset.row_by_key("Q1?VPN1").is_some());
//! ```
//!
//! # Architecture
//!
//! - [`events`]: Streaming XML event source
//! - [`config`]: Extraction configuration
//! - [`columns`]: Ordered column discovery
//! - [`key`]: Row key synthesis
//! - [`engine`]: The extraction state machine
//! - [`dataset`]: Extracted tables
//! - [`error`]: Error types and Result alias

pub mod columns;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod events;
pub mod key;

pub use engine::{extract, RecordExtractor};

pub use columns::ColumnSet;
pub use config::{ExtractionConfig, ExtractionMode, NestedRows};
pub use dataset::{ExtractedDataset, Row, StructuralMismatch, TableLevel};
pub use error::{ExtractorError, Result};
pub use key::{RowKey, RowKeySpec};

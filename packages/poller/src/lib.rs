//! sempwatch poller - Query a message broker over SEMP and tabulate the replies.
//!
//! Each monitor pairs a SEMP request with the extraction configuration that
//! reads its reply. The poller posts the request, checks the broker's
//! result code and hands the reply to `sempwatch-extractor`.
//!
//! # Example
//!
//! ```
//! use sempwatch_poller::monitors::find_monitor;
//! use sempwatch_poller::poll::parse_reply;
//!
//! let monitor = find_monitor("vpn-limits", &[]).unwrap();
//! let reply = r#"<rpc-reply><rpc><show><message-vpn><vpn>
//!     <name>default</name><local-status>Up</local-status>
//!     </vpn></message-vpn></show></rpc><execute-result code="ok"/></rpc-reply>"#;
//!
//! let sample = parse_reply(&monitor, reply).unwrap();
//! assert_eq!(sample.dataset.row_by_key("default").and_then(|r| r.get(1)), Some("Up"));
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Constants, broker configuration file and validation
//! - [`error`]: Error types and Result alias
//! - [`http`]: SEMP transport with retries
//! - [`reply`]: Result code check
//! - [`monitors`]: Preset and custom monitors
//! - [`poll`]: Polling service
//! - [`output`]: Table, YAML and JSON rendering
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod monitors;
pub mod output;
pub mod poll;
pub mod reply;

pub use config::{load_config, BrokerConfig, PollerConfig};
pub use error::{PollerError, Result};
pub use monitors::{find_monitor, presets, Monitor};
pub use output::{render, OutputFormat};
pub use poll::{parse_reply, Poller, Sample};

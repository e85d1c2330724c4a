//! Polling service that ties transport, reply check and extraction together.

use chrono::{DateTime, Local};
use reqwest::blocking::Client;

use sempwatch_extractor::{ExtractedDataset, RecordExtractor};

use crate::config::BrokerConfig;
use crate::error::Result;
use crate::http::{create_client, post_semp};
use crate::monitors::Monitor;
use crate::reply::check_reply;

/// One extracted reply.
#[derive(Debug, Clone)]
pub struct Sample {
    pub monitor: String,
    pub taken_at: DateTime<Local>,
    pub dataset: ExtractedDataset,
}

/// Extract a reply already in hand (e.g. saved to disk).
///
/// # Arguments
/// * `monitor` - Monitor whose request produced `reply`
/// * `reply` - The reply XML
///
/// # Returns
/// A `Sample` stamped with the current time
pub fn parse_reply(monitor: &Monitor, reply: &str) -> Result<Sample> {
    let mut extractor = RecordExtractor::new(monitor.extraction.clone())?;
    let dataset = extractor.parse(reply)?;
    check_reply(reply)?;
    Ok(Sample {
        monitor: monitor.name.clone(),
        taken_at: Local::now(),
        dataset,
    })
}

/// Repeatedly runs one monitor against one broker.
///
/// The extractor is built once and reused; each poll starts from a clean
/// extraction state.
pub struct Poller {
    client: Client,
    broker: BrokerConfig,
    monitor: Monitor,
    extractor: RecordExtractor,
}

impl Poller {
    /// Create a poller after validating broker and monitor.
    pub fn new(broker: BrokerConfig, monitor: Monitor) -> Result<Self> {
        broker.validate()?;
        let client = create_client(broker.timeout_secs())?;
        let extractor = RecordExtractor::new(monitor.extraction.clone())?;
        Ok(Self {
            client,
            broker,
            monitor,
            extractor,
        })
    }

    /// Monitor this poller runs.
    #[must_use]
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Send the request once and extract the reply.
    pub fn poll_once(&mut self) -> Result<Sample> {
        tracing::debug!(
            monitor = %self.monitor.name,
            url = %self.broker.semp_url(),
            "Polling broker"
        );
        let reply = post_semp(&self.client, &self.broker, &self.monitor.request)?;
        let taken_at = Local::now();
        let dataset = self.extractor.parse(&reply)?;
        check_reply(&reply)?;
        tracing::info!(
            monitor = %self.monitor.name,
            rows = dataset.row_count(),
            "Sample extracted"
        );
        Ok(Sample {
            monitor: self.monitor.name.clone(),
            taken_at,
            dataset,
        })
    }
}

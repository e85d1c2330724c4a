//! Monitor presets: a SEMP request paired with the configuration that
//! turns its reply into a table.
//!
//! Custom monitors from the configuration file use the same shape and take
//! precedence over a preset of the same name.

use serde::Deserialize;

use sempwatch_extractor::config::VPN_RECORD_ENVELOPE_DEPTH;
use sempwatch_extractor::{ExtractionConfig, RowKeySpec};

use crate::error::{PollerError, Result};

/// A named query and how to read its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    pub name: String,
    pub description: String,
    /// SEMP request body.
    pub request: String,
    pub extraction: ExtractionConfig,
}

impl Monitor {
    fn new(
        name: &str,
        description: &str,
        request: impl Into<String>,
        extraction: ExtractionConfig,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            request: request.into(),
            extraction,
        }
    }
}

/// Wrap a `<show>` body in the request envelope.
fn show_request(body: &str) -> String {
    format!("<rpc><show>{body}</show></rpc>")
}

const QUEUE_FIELDS: [&str; 21] = [
    "name",
    "message-vpn",
    "durable",
    "ingress-config-status",
    "egress-config-status",
    "access-type",
    "owner",
    "quota",
    "respect-ttl",
    "max-ttl",
    "reject-msg-to-sender-on-discard",
    "num-messages-spooled",
    "current-spool-usage-in-mb",
    "high-water-mark-in-mb",
    "total-delivered-unacked-msgs",
    "max-redelivery",
    "oldest-msg-id",
    "newest-msg-id",
    "bind-count",
    "max-bind-count",
    "dead-message-queue",
];

const QUEUE_CLIENT_FIELDS: [&str; 6] = [
    "name",
    "is-active",
    "window-size",
    "connect-time",
    "flow-id",
    "last-msg-id-delivered",
];

const CLIENT_PROFILE_FIELDS: [&str; 10] = [
    "name",
    "message-vpn",
    "maximum-transacted-sessions",
    "maximum-transactions",
    "maximum-endpoints-per-client-username",
    "maximum-egress-flows",
    "maximum-ingress-flows",
    "max-connections-per-client-username",
    "num-users",
    "max-subscriptions",
];

const CLIENT_FIELDS: [&str; 6] = [
    "name",
    "message-vpn",
    "profile",
    "num-subscriptions",
    "total-ingress-flows",
    "total-egress-flows",
];

const SLOW_SUBSCRIBER_FIELDS: [&str; 12] = [
    "name",
    "message-vpn",
    "client-address",
    "num-subscriptions",
    "eliding-enabled",
    "eliding-topics",
    "uptime",
    "client-username",
    "profile",
    "user",
    "description",
    "platform",
];

const VPN_LIMIT_FIELDS: [&str; 7] = [
    "name",
    "locally-configured",
    "local-status",
    "total-unique-subscriptions",
    "max-subscriptions",
    "connections-service-smf",
    "max-connections-service-smf",
];

const VPN_SPOOL_FIELDS: [&str; 13] = [
    "name",
    "current-queues-and-topic-endpoints",
    "maximum-queues-and-topic-endpoints",
    "current-spool-usage-mb",
    "maximum-spool-usage-mb",
    "current-transacted-sessions",
    "maximum-transacted-sessions",
    "current-transactions",
    "maximum-transactions",
    "current-egress-flows",
    "maximum-egress-flows",
    "current-ingress-flows",
    "maximum-ingress-flows",
];

const VPN_RATE_FIELDS: [&str; 25] = [
    "name",
    "client-data-messages-received",
    "client-data-messages-sent",
    "client-persistent-messages-received",
    "client-persistent-messages-sent",
    "client-non-persistent-messages-received",
    "client-non-persistent-messages-sent",
    "client-direct-messages-received",
    "client-direct-messages-sent",
    "client-data-bytes-received",
    "client-data-bytes-sent",
    "client-persistent-bytes-received",
    "client-persistent-bytes-sent",
    "client-non-persistent-bytes-received",
    "client-non-persistent-bytes-sent",
    "client-direct-bytes-received",
    "client-direct-bytes-sent",
    "current-ingress-rate-per-second",
    "current-egress-rate-per-second",
    "current-ingress-byte-rate-per-second",
    "current-egress-byte-rate-per-second",
    "average-ingress-rate-per-minute",
    "average-egress-rate-per-minute",
    "average-ingress-byte-rate-per-minute",
    "average-egress-byte-rate-per-minute",
];

const CONFIG_SYNC_FIELDS: [&str; 6] = [
    "name",
    "type",
    "sync-state",
    "ownership",
    "time-in-state",
    "time-in-state-seconds",
];

const SOURCE_ROUTER_FIELDS: [&str; 6] = [
    "name",
    "ownership",
    "sync-state",
    "time-in-state",
    "stale",
    "time-last-msg-received",
];

const BRIDGE_FIELDS: [&str; 10] = [
    "bridge-name",
    "local-vpn-name",
    "connected-remote-vpn-name",
    "connected-remote-router-name",
    "admin-state",
    "inbound-operational-state",
    "outbound-operational-state",
    "queue-operational-state",
    "connection-uptime-in-seconds",
    "client-name",
];

const LATENCY_KINDS: [&str; 4] = [
    "disk-latency",
    "compute-latency",
    "network-latency",
    "mate-link-latency",
];

const LATENCY_SUFFIXES: [&str; 6] = [
    "minimum-value",
    "maximum-value",
    "average-value",
    "current-value",
    "high-threshold",
    "suppressed-events",
];

const SERVICE_LIMIT_FIELDS: [&str; 7] = [
    "max-connections-service-smf",
    "max-disk-usage",
    "message-spool-entities-allowed-by-qendpt",
    "max-transacted-sessions",
    "max-transactions",
    "ingress-flows-allowed",
    "flows-allowed",
];

const VPN_IGNORED: [&str; 4] = [
    "authentication",
    "semp-over-message-bus-configuration",
    "event-configuration",
    "certificate-revocation-check-stats",
];

const VPN_RATE_IGNORED: [&str; 4] = [
    "authentication",
    "ingress-discards",
    "egress-discards",
    "certificate-revocation-check-stats",
];

fn queue_request() -> String {
    show_request("<queue><name>*</name><vpn-name>*</vpn-name><detail></detail></queue>")
}

fn system_health_targets() -> Vec<String> {
    std::iter::once("last-clear-time".to_string())
        .chain(LATENCY_KINDS.iter().flat_map(|kind| {
            LATENCY_SUFFIXES
                .iter()
                .map(move |suffix| format!("{kind}-{suffix}"))
        }))
        .collect()
}

/// Every built-in monitor, in listing order.
#[must_use]
pub fn presets() -> Vec<Monitor> {
    let vpn_keyed = Some(RowKeySpec::lookup_only("name"));

    vec![
        Monitor::new(
            "queues",
            "Queue depth, quota and bind counts",
            queue_request(),
            ExtractionConfig::targeted("queue", QUEUE_FIELDS).with_ignored(["event", "clients"]),
        ),
        Monitor::new(
            "queues-ex",
            "Queues with their bound consumer flows",
            queue_request(),
            ExtractionConfig::targeted("queue", QUEUE_FIELDS)
                .with_ignored(["event"])
                .with_nested("client", QUEUE_CLIENT_FIELDS),
        ),
        Monitor::new(
            "client-profiles",
            "Client profile limits",
            show_request("<client-profile><name>*</name><detail></detail></client-profile>"),
            ExtractionConfig::targeted("profile", CLIENT_PROFILE_FIELDS).with_ignored([
                "profile-users",
                "tcp",
                "ssl",
                "compression",
                "event-configuration",
            ]),
        ),
        Monitor::new(
            "clients",
            "Connected clients with their profile and flows",
            show_request("<client><name>*</name><detail></detail></client>"),
            ExtractionConfig::targeted("client", CLIENT_FIELDS)
                .with_ignored(["event-configuration"]),
        ),
        Monitor::new(
            "slow-subscribers",
            "Clients the broker has flagged as slow subscribers",
            show_request("<client><name>*</name><detail/><slow-subscriber/></client>"),
            ExtractionConfig::targeted("client", SLOW_SUBSCRIBER_FIELDS)
                .with_ignored(["event-configuration"]),
        ),
        Monitor::new(
            "vpn-limits",
            "Message VPN subscription and connection limits",
            show_request("<message-vpn><vpn-name>*</vpn-name><detail></detail></message-vpn>"),
            ExtractionConfig::targeted("vpn", VPN_LIMIT_FIELDS)
                .with_ignored(VPN_IGNORED)
                .with_row_key(vpn_keyed.clone())
                .with_envelope_depth(VPN_RECORD_ENVELOPE_DEPTH),
        ),
        Monitor::new(
            "vpn-spool",
            "Message VPN spool, transaction and flow limits",
            show_request("<message-spool><vpn-name>*</vpn-name><detail></detail></message-spool>"),
            ExtractionConfig::targeted("vpn", VPN_SPOOL_FIELDS)
                .with_ignored(["event-configuration"])
                .with_row_key(vpn_keyed.clone())
                .with_envelope_depth(VPN_RECORD_ENVELOPE_DEPTH),
        ),
        Monitor::new(
            "vpn-rates",
            "Message VPN message and byte rates",
            show_request("<message-vpn><vpn-name>*</vpn-name><stats></stats></message-vpn>"),
            ExtractionConfig::targeted("vpn", VPN_RATE_FIELDS)
                .with_ignored(VPN_RATE_IGNORED)
                .with_row_key(vpn_keyed)
                .with_envelope_depth(VPN_RECORD_ENVELOPE_DEPTH),
        ),
        Monitor::new(
            "config-sync",
            "Config-sync tables with their remote source routers",
            show_request("<config-sync><database/><remote/></config-sync>"),
            ExtractionConfig::targeted("table", CONFIG_SYNC_FIELDS)
                .with_ignored(["not-used"])
                .with_nested("source-router", SOURCE_ROUTER_FIELDS)
                // Table names repeat across types (router vs. vpn).
                .with_row_key(Some(RowKeySpec {
                    primary: "type".to_string(),
                    secondary: Some("name".to_string()),
                    ..RowKeySpec::default()
                })),
        ),
        Monitor::new(
            "bridges",
            "Message VPN bridge states",
            show_request("<bridge><bridge-name-pattern>*</bridge-name-pattern><detail></detail></bridge>"),
            ExtractionConfig::targeted("bridge", BRIDGE_FIELDS)
                .with_ignored(["remote-message-vpn-list"])
                .with_row_key(Some(RowKeySpec {
                    primary: "bridge-name".to_string(),
                    secondary: Some("local-vpn-name".to_string()),
                    ..RowKeySpec::default()
                })),
        ),
        Monitor::new(
            "users",
            "Management users",
            show_request("<username><username-pattern>*</username-pattern></username>"),
            ExtractionConfig::capture_all("user"),
        ),
        Monitor::new(
            "top-publishers",
            "Ten clients with the highest ingress byte rate",
            show_request(
                "<client><name>*</name><sorted-stats/>\
                 <stats-to-show>current-ingress-message-rate-per-second,average-ingress-message-rate-per-minute,\
                 current-ingress-byte-rate-per-second,average-ingress-byte-rate-per-minute,total-client-bytes-received</stats-to-show>\
                 <sort-by/><stats-to-sort-by>average-ingress-byte-rate-per-minute</stats-to-sort-by>\
                 <count/><num-elements>10</num-elements></client>",
            ),
            ExtractionConfig::capture_all("row"),
        ),
        Monitor::new(
            "system-health",
            "Disk, compute, network and mate-link latency",
            show_request("<system><health></health></system>"),
            ExtractionConfig::flat(system_health_targets()),
        ),
        Monitor::new(
            "service-limits",
            "Broker-wide connection, spool and flow limits",
            show_request("<service></service>"),
            ExtractionConfig::flat(SERVICE_LIMIT_FIELDS),
        ),
    ]
}

/// Find a monitor by name, preferring custom definitions over presets.
///
/// # Errors
/// Returns `UnknownMonitor` when neither list has `name`.
pub fn find_monitor(name: &str, custom: &[Monitor]) -> Result<Monitor> {
    if let Some(monitor) = custom.iter().find(|m| m.name == name) {
        return Ok(monitor.clone());
    }
    presets()
        .into_iter()
        .find(|m| m.name == name)
        .ok_or_else(|| PollerError::UnknownMonitor(name.to_string()))
}

/// Extraction strategy named in a custom monitor definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModeDefinition {
    #[default]
    Targeted,
    CaptureAll,
    Flat,
}

/// Second row level of a custom monitor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NestedDefinition {
    pub row_element: String,
    pub fields: Vec<String>,
}

/// Row key of a custom monitor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyDefinition {
    pub primary: String,
    #[serde(default)]
    pub secondary: Option<String>,
    /// Name of the identity column; left out means lookup only.
    #[serde(default)]
    pub column: Option<String>,
}

/// A monitor as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub request: String,
    #[serde(default)]
    pub mode: ModeDefinition,
    #[serde(default)]
    pub row_element: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub nested: Option<NestedDefinition>,
    /// Overrides the mode's default key.
    #[serde(default)]
    pub key: Option<KeyDefinition>,
    #[serde(default)]
    pub envelope_depth: Option<usize>,
}

impl MonitorDefinition {
    /// Build and validate the monitor this definition describes.
    pub fn into_monitor(self) -> Result<Monitor> {
        let mut extraction = match self.mode {
            ModeDefinition::Targeted => ExtractionConfig::targeted(self.row_element, self.fields),
            ModeDefinition::CaptureAll => ExtractionConfig::capture_all(self.row_element),
            ModeDefinition::Flat => ExtractionConfig::flat(self.fields),
        }
        .with_ignored(self.ignore);

        if let Some(nested) = self.nested {
            extraction = extraction.with_nested(nested.row_element, nested.fields);
        }
        if let Some(key) = self.key {
            extraction = extraction.with_row_key(Some(RowKeySpec {
                primary: key.primary,
                secondary: key.secondary,
                key_column: key.column,
            }));
        }
        if let Some(depth) = self.envelope_depth {
            extraction = extraction.with_envelope_depth(depth);
        }
        extraction.validate()?;

        Ok(Monitor {
            name: self.name,
            description: self.description,
            request: self.request,
            extraction,
        })
    }
}

/// Turn every definition into a monitor, failing on the first invalid one.
pub fn custom_monitors(definitions: Vec<MonitorDefinition>) -> Result<Vec<Monitor>> {
    definitions
        .into_iter()
        .map(MonitorDefinition::into_monitor)
        .collect()
}

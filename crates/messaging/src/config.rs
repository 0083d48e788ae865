//! Gateway behaviour switches.

/// Configuration for the [`Gateway`](crate::Gateway).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Send an `error` event back to the originating session when an event
    /// is rejected or fails. When false, rejected events are dropped silently.
    pub report_errors: bool,

    /// Broadcast messages sent through the REST path exactly like realtime
    /// sends. When false, REST sends are durable but reach other sessions
    /// only on their next fetch.
    pub fanout_rest_sends: bool,

    /// Require the session's phone number to be a participant before joining
    /// a conversation, and to match `sender` on sends and typing events.
    pub enforce_membership: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            report_errors: false,
            fanout_rest_sends: true,
            enforce_membership: false,
        }
    }
}

impl GatewayConfig {
    /// Strict profile: errors reported, membership enforced.
    pub fn strict() -> Self {
        Self {
            report_errors: true,
            enforce_membership: true,
            ..Default::default()
        }
    }
}

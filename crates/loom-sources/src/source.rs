//! The source descriptor model (§3, §4.11): declarative records of where
//! observations come from, plus the connection status observed against
//! each one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Variant-specific configuration for a source (§3). The `variant` tag
/// doubles as the discriminant the manager uses to pick an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "UPPERCASE")]
pub enum SourceVariant {
    /// Registers an endpoint on the reporter HTTP surface; an optional
    /// shared secret enables HMAC-SHA256 request verification.
    Webhook {
        #[serde(default)]
        shared_secret: Option<String>,
    },
    /// Polls `endpoint` at `interval_secs` (must be ≥ 1).
    Polling {
        endpoint: String,
        interval_secs: u64,
    },
    /// Maintains a persistent streaming connection to `endpoint`,
    /// reconnecting with backoff on disconnect.
    Stream { endpoint: String },
}

impl SourceVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook { .. } => "WEBHOOK",
            Self::Polling { .. } => "POLLING",
            Self::Stream { .. } => "STREAM",
        }
    }

    /// §4.11 invariant: polling interval must be at least one second.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Polling { interval_secs, .. } if *interval_secs < 1 => {
                Err("polling interval_secs must be >= 1".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Observed connection health for one source (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub error_count: u64,
    pub last_error_message: Option<String>,
}

impl ConnectionStatus {
    pub fn record_success(&mut self) {
        self.last_success_at = Some(Utc::now());
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error_at = Some(Utc::now());
        self.error_count += 1;
        self.last_error_message = Some(message.into());
    }

    /// A source is considered failing once it has seen an error more
    /// recently than its last success (or has never succeeded at all).
    pub fn is_failing(&self) -> bool {
        match (self.last_error_at, self.last_success_at) {
            (Some(err), Some(ok)) => err > ok,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// A declared source (§3): unique id, display name, variant, enabled
/// flag, and observed status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    pub variant: SourceVariant,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub status: ConnectionStatus,
}

fn default_enabled() -> bool {
    true
}

impl SourceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, variant: SourceVariant) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            variant,
            enabled: true,
            status: ConnectionStatus::default(),
        }
    }
}

/// HAProxy control requests, relayed through the dashboard backend

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::utils::{MAX_WEIGHT, MIN_WEIGHT};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ControlError {
    #[error("Weight must be a number between {} and {}", MIN_WEIGHT, MAX_WEIGHT)]
    InvalidWeight(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Rejected(String),
}

/// A control command for one backend server, or for HAProxy itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    Enable { host: String },
    Disable { host: String },
    SetWeight { host: String, weight: u32 },
    Restart,
}

impl ControlAction {
    /// Question shown before running the action
    pub fn confirm_prompt(&self) -> String {
        match self {
            ControlAction::Enable { host } => format!("Enable traffic to {} in HAProxy?", host),
            ControlAction::Disable { host } => format!("Disable traffic to {} in HAProxy?", host),
            ControlAction::SetWeight { host, weight } => {
                format!("Set HAProxy weight of {} to {}?", host, weight)
            }
            ControlAction::Restart => "Are you sure you want to restart HAProxy?".to_string(),
        }
    }

    pub fn success_message(&self) -> String {
        match self {
            ControlAction::Enable { host } => format!("Enabled {} in HAProxy", host),
            ControlAction::Disable { host } => format!("Disabled {} in HAProxy", host),
            ControlAction::SetWeight { host, weight } => {
                format!("Server {} weight set to {}", host, weight)
            }
            ControlAction::Restart => "HAProxy restarted successfully".to_string(),
        }
    }

    fn path(&self) -> &'static str {
        match self {
            ControlAction::Enable { .. } => "/api/haproxy/server/enable",
            ControlAction::Disable { .. } => "/api/haproxy/server/disable",
            ControlAction::SetWeight { .. } => "/api/haproxy/server/weight",
            ControlAction::Restart => "/api/haproxy/restart",
        }
    }

    fn payload(&self) -> serde_json::Value {
        match self {
            ControlAction::Enable { host } | ControlAction::Disable { host } => json!({ "host": host }),
            ControlAction::SetWeight { host, weight } => {
                json!({ "server_name": host, "weight": weight })
            }
            ControlAction::Restart => json!({}),
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAction::Enable { host } => write!(f, "Enable {}", host),
            ControlAction::Disable { host } => write!(f, "Disable {}", host),
            ControlAction::SetWeight { host, weight } => write!(f, "Set weight {} on {}", weight, host),
            ControlAction::Restart => write!(f, "Restart HAProxy"),
        }
    }
}

/// Parse a weight typed by the user
pub fn parse_weight(raw: &str) -> Result<u32, ControlError> {
    let invalid = || ControlError::InvalidWeight(raw.to_string());
    let weight: i64 = raw.trim().parse().map_err(|_| invalid())?;

    if weight < MIN_WEIGHT as i64 || weight > MAX_WEIGHT as i64 {
        return Err(invalid());
    }
    Ok(weight as u32)
}

/// Reply of the control endpoints; the weight endpoint says `success`, the others `ok`
#[derive(Debug, Default, Deserialize)]
struct ControlReply {
    ok: Option<bool>,
    success: Option<bool>,
    error: Option<String>,
    message: Option<String>,
    stderr: Option<String>,
}

impl ControlReply {
    fn accepted(&self) -> bool {
        self.ok.or(self.success).unwrap_or(false)
    }

    fn failure_reason(self) -> String {
        self.stderr
            .filter(|s| !s.trim().is_empty())
            .or(self.error)
            .or(self.message)
            .unwrap_or_else(|| "Failed".to_string())
    }
}

/// Decide the outcome of a control request from its HTTP status and body
fn interpret_reply(status: u16, body: &str) -> Result<(), ControlError> {
    match serde_json::from_str::<ControlReply>(body) {
        Ok(reply) if reply.accepted() && (200..300).contains(&status) => Ok(()),
        Ok(reply) if reply.ok.is_some() || reply.success.is_some() || reply.error.is_some() => {
            Err(ControlError::Rejected(reply.failure_reason()))
        }
        _ if !(200..300).contains(&status) => Err(ControlError::Status(status)),
        _ => Err(ControlError::Rejected("Failed".to_string())),
    }
}

pub struct HaproxyControl {
    client: Client,
    base_url: String,
}

impl HaproxyControl {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run an action; returns the message to show on success
    pub async fn execute(&self, action: &ControlAction) -> Result<String, ControlError> {
        if let ControlAction::SetWeight { weight, .. } = action {
            if *weight > MAX_WEIGHT {
                return Err(ControlError::InvalidWeight(weight.to_string()));
            }
        }

        let url = format!("{}{}", self.base_url, action.path());
        let response = self
            .client
            .post(&url)
            .json(&action.payload())
            .send()
            .await
            .map_err(|e| ControlError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ControlError::Transport(e.to_string()))?;

        interpret_reply(status, &body)?;
        info!(action = %action, "haproxy control accepted");
        Ok(action.success_message())
    }

    pub async fn enable(&self, host: &str) -> Result<String, ControlError> {
        self.execute(&ControlAction::Enable { host: host.to_string() }).await
    }

    pub async fn disable(&self, host: &str) -> Result<String, ControlError> {
        self.execute(&ControlAction::Disable { host: host.to_string() }).await
    }

    pub async fn set_weight(&self, host: &str, weight: u32) -> Result<String, ControlError> {
        self.execute(&ControlAction::SetWeight {
            host: host.to_string(),
            weight,
        })
        .await
    }

    pub async fn restart(&self) -> Result<String, ControlError> {
        self.execute(&ControlAction::Restart).await
    }
}

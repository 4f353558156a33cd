use config::ConfigError;
use serde::Deserialize;

/// Upper bound for heartbeat timings; larger values are almost certainly a
/// unit mistake (milliseconds given as seconds).
const MAX_HEARTBEAT_SECS: u64 = 86_400;

/// Top-level configuration settings for a realtime client.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub reconnect: ReconnectSettings,
    pub heartbeat: HeartbeatSettings,
    pub queue: QueueSettings,
    pub logging: LoggingSettings,
}

/// Where the realtime endpoint lives.
///
/// `url` is the HTTP(S) API base; the WebSocket URL is derived from it.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub url: String,
    pub realtime_path: String,
    pub credential_param: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthSettings {
    pub api_key: Option<String>,
}

/// Backoff parameters. `max_attempts == 0` retries forever.
#[derive(Debug, Deserialize, Clone)]
pub struct ReconnectSettings {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeartbeatSettings {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

/// Bound on messages buffered while disconnected. `0` means unbounded.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueSettings {
    pub max_pending: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub reconnect: Option<PartialReconnectSettings>,
    pub heartbeat: Option<PartialHeartbeatSettings>,
    pub queue: Option<PartialQueueSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub url: Option<String>,
    pub realtime_path: Option<String>,
    pub credential_param: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialAuthSettings {
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialReconnectSettings {
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PartialHeartbeatSettings {
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialQueueSettings {
    pub max_pending: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Settings {
    /// Fills every value missing from `partial` with the default.
    pub fn merged(partial: PartialSettings) -> Self {
        let default = Settings::default();

        Self {
            server: ServerSettings {
                url: partial
                    .server
                    .as_ref()
                    .and_then(|s| s.url.clone())
                    .unwrap_or(default.server.url),
                realtime_path: partial
                    .server
                    .as_ref()
                    .and_then(|s| s.realtime_path.clone())
                    .unwrap_or(default.server.realtime_path),
                credential_param: partial
                    .server
                    .as_ref()
                    .and_then(|s| s.credential_param.clone())
                    .unwrap_or(default.server.credential_param),
            },
            auth: AuthSettings {
                api_key: partial
                    .auth
                    .as_ref()
                    .and_then(|a| a.api_key.clone())
                    .or(default.auth.api_key),
            },
            reconnect: ReconnectSettings {
                base_delay_ms: partial
                    .reconnect
                    .as_ref()
                    .and_then(|r| r.base_delay_ms)
                    .unwrap_or(default.reconnect.base_delay_ms),
                max_delay_ms: partial
                    .reconnect
                    .as_ref()
                    .and_then(|r| r.max_delay_ms)
                    .unwrap_or(default.reconnect.max_delay_ms),
                max_attempts: partial
                    .reconnect
                    .as_ref()
                    .and_then(|r| r.max_attempts)
                    .unwrap_or(default.reconnect.max_attempts),
            },
            heartbeat: HeartbeatSettings {
                interval_secs: partial
                    .heartbeat
                    .as_ref()
                    .and_then(|h| h.interval_secs)
                    .unwrap_or(default.heartbeat.interval_secs),
                timeout_secs: partial
                    .heartbeat
                    .as_ref()
                    .and_then(|h| h.timeout_secs)
                    .unwrap_or(default.heartbeat.timeout_secs),
            },
            queue: QueueSettings {
                max_pending: partial
                    .queue
                    .as_ref()
                    .and_then(|q| q.max_pending)
                    .unwrap_or(default.queue.max_pending),
            },
            logging: LoggingSettings {
                level: partial
                    .logging
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .unwrap_or(default.logging.level),
            },
        }
    }

    /// Rejects timings the reconnect and heartbeat loops cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let heartbeat = &self.heartbeat;
        if !(1..=MAX_HEARTBEAT_SECS).contains(&heartbeat.interval_secs) {
            return Err(ConfigError::Message(format!(
                "heartbeat.interval_secs must be between 1 and {MAX_HEARTBEAT_SECS}, got {}",
                heartbeat.interval_secs
            )));
        }
        if !(1..=MAX_HEARTBEAT_SECS).contains(&heartbeat.timeout_secs) {
            return Err(ConfigError::Message(format!(
                "heartbeat.timeout_secs must be between 1 and {MAX_HEARTBEAT_SECS}, got {}",
                heartbeat.timeout_secs
            )));
        }

        let reconnect = &self.reconnect;
        if reconnect.base_delay_ms == 0 {
            return Err(ConfigError::Message(
                "reconnect.base_delay_ms must be greater than 0".to_string(),
            ));
        }
        if reconnect.max_delay_ms < reconnect.base_delay_ms {
            return Err(ConfigError::Message(format!(
                "reconnect.max_delay_ms ({}) is below reconnect.base_delay_ms ({})",
                reconnect.max_delay_ms, reconnect.base_delay_ms
            )));
        }
        Ok(())
    }

    /// Points the settings at another API base, keeping everything else.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server.url = url.into();
        self
    }
}

/// Provides default values for `Settings`.
///
/// Reconnect and heartbeat defaults match what the realtime server expects:
/// 1s doubling to 30s between attempts, a ping every 30s and a 70s liveness
/// window.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                url: "http://127.0.0.1:8080/v1".to_string(),
                realtime_path: "realtime".to_string(),
                credential_param: "projectId".to_string(),
            },
            auth: AuthSettings::default(),
            reconnect: ReconnectSettings {
                base_delay_ms: 1_000,
                max_delay_ms: 30_000,
                max_attempts: 0,
            },
            heartbeat: HeartbeatSettings {
                interval_secs: 30,
                timeout_secs: 70,
            },
            queue: QueueSettings { max_pending: 0 },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

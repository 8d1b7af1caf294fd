use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::file::expand_path;
use crate::utils::time::Calendar;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_INGEST_PATH,
    DEFAULT_LIVENESS_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_PROBE_INTERVAL_SECS, DEFAULT_PROBE_NAME,
    DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_PROBE_URL, DEFAULT_SWEEP_INTERVAL_SECS,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Bot ingest socket section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct IngestFileConfig {
    pub path: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LivenessFileConfig {
    pub sweep_interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

/// Endpoint probe section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProbesFileConfig {
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    /// Replaces (does not extend) the endpoint list of lower layers
    pub endpoints: Option<Vec<ProbeEndpoint>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct StatsFileConfig {
    pub timezone: Option<String>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub ingest: Option<IngestFileConfig>,
    pub liveness: Option<LivenessFileConfig>,
    pub probes: Option<ProbesFileConfig>,
    pub stats: Option<StatsFileConfig>,
    pub bots: Option<Vec<KnownBot>>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown top-level keys
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str = map.keys().map(|k| k.as_str()).collect::<Vec<_>>().join(", ");
            tracing::warn!(fields = %keys_str, "Unknown fields in config file (possible typos)");
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                current.host = server.host;
            }
            if server.port.is_some() {
                current.port = server.port;
            }
        }

        if let Some(ingest) = other.ingest {
            let current = self.ingest.get_or_insert_with(IngestFileConfig::default);
            if ingest.path.is_some() {
                current.path = ingest.path;
            }
            if ingest.token.is_some() {
                tracing::trace!("Merging ingest.token");
                current.token = ingest.token;
            }
        }

        if let Some(liveness) = other.liveness {
            let current = self.liveness.get_or_insert_with(LivenessFileConfig::default);
            if liveness.sweep_interval_secs.is_some() {
                current.sweep_interval_secs = liveness.sweep_interval_secs;
            }
            if liveness.timeout_secs.is_some() {
                current.timeout_secs = liveness.timeout_secs;
            }
        }

        if let Some(probes) = other.probes {
            let current = self.probes.get_or_insert_with(ProbesFileConfig::default);
            if probes.interval_secs.is_some() {
                current.interval_secs = probes.interval_secs;
            }
            if probes.timeout_secs.is_some() {
                current.timeout_secs = probes.timeout_secs;
            }
            if probes.endpoints.is_some() {
                tracing::trace!(endpoints = ?probes.endpoints, "Merging probes.endpoints");
                current.endpoints = probes.endpoints;
            }
        }

        if let Some(stats) = other.stats {
            let current = self.stats.get_or_insert_with(StatsFileConfig::default);
            if stats.timezone.is_some() {
                current.timezone = stats.timezone;
            }
        }

        if other.bots.is_some() {
            self.bots = other.bots;
        }
        if other.debug.is_some() {
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Ingest socket settings
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Route the socket is mounted on
    pub path: String,
    /// Shared secret; `None` accepts every client
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LivenessConfig {
    pub sweep_interval: Duration,
    pub timeout: Duration,
}

/// An endpoint polled by the probe loop
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProbeEndpoint {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ProbesConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub endpoints: Vec<ProbeEndpoint>,
}

/// A bot the dashboard should list even before it has connected
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KnownBot {
    pub id: String,
    #[serde(default)]
    pub nickname: String,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ingest: IngestConfig,
    pub liveness: LivenessConfig,
    pub probes: ProbesConfig,
    pub calendar: Calendar,
    pub bots: Vec<KnownBot>,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.botboard/botboard.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(cli, file_config)?;
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            ingest_path = %config.ingest.path,
            ingest_auth = config.ingest.token.is_some(),
            endpoints = config.probes.endpoints.len(),
            calendar = %config.calendar,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Resolve defaults, file values and CLI overrides into a runtime config
    pub(crate) fn from_layers(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let file_server = file_config.server.unwrap_or_default();
        let file_ingest = file_config.ingest.unwrap_or_default();
        let file_liveness = file_config.liveness.unwrap_or_default();
        let file_probes = file_config.probes.unwrap_or_default();
        let file_stats = file_config.stats.unwrap_or_default();

        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        // "nil" was historically written into config files to mean "root"
        let ingest_path = cli
            .ingest_path
            .clone()
            .or(file_ingest.path)
            .filter(|p| !p.trim().is_empty() && p != "nil")
            .unwrap_or_else(|| DEFAULT_INGEST_PATH.to_string());
        let ingest_token = cli
            .ingest_token
            .clone()
            .or(file_ingest.token)
            .filter(|t| !t.is_empty());

        let timezone = cli.timezone.clone().or(file_stats.timezone);
        let calendar = match timezone {
            Some(tz) => tz
                .parse::<Calendar>()
                .map_err(|e| anyhow::anyhow!("Configuration error: stats.timezone: {}", e))?,
            None => Calendar::Local,
        };

        let endpoints = file_probes.endpoints.unwrap_or_else(|| {
            vec![ProbeEndpoint {
                name: DEFAULT_PROBE_NAME.to_string(),
                url: DEFAULT_PROBE_URL.to_string(),
            }]
        });

        Ok(Self {
            server: ServerConfig { host, port },
            ingest: IngestConfig {
                path: ingest_path,
                token: ingest_token,
            },
            liveness: LivenessConfig {
                sweep_interval: Duration::from_secs(
                    file_liveness
                        .sweep_interval_secs
                        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
                ),
                timeout: Duration::from_secs(
                    file_liveness
                        .timeout_secs
                        .unwrap_or(DEFAULT_LIVENESS_TIMEOUT_SECS),
                ),
            },
            probes: ProbesConfig {
                interval: Duration::from_secs(
                    file_probes
                        .interval_secs
                        .unwrap_or(DEFAULT_PROBE_INTERVAL_SECS),
                ),
                timeout: Duration::from_secs(
                    file_probes.timeout_secs.unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
                ),
                endpoints,
            },
            calendar,
            bots: file_config.bots.unwrap_or_default(),
            debug: cli.debug || file_config.debug.unwrap_or(false),
        })
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }
        if !self.ingest.path.starts_with('/') {
            anyhow::bail!(
                "Configuration error: ingest.path must start with '/' (got '{}')",
                self.ingest.path
            );
        }
        if self.ingest.path.starts_with("/api/") || self.ingest.path == "/api" {
            anyhow::bail!(
                "Configuration error: ingest.path must not be under /api (got '{}')",
                self.ingest.path
            );
        }
        if self.liveness.sweep_interval.is_zero() || self.liveness.timeout.is_zero() {
            anyhow::bail!("Configuration error: liveness intervals must be greater than 0");
        }
        if self.probes.interval.is_zero() || self.probes.timeout.is_zero() {
            anyhow::bail!("Configuration error: probe intervals must be greater than 0");
        }
        for endpoint in &self.probes.endpoints {
            if endpoint.name.trim().is_empty() || endpoint.url.trim().is_empty() {
                anyhow::bail!(
                    "Configuration error: every probes.endpoints entry needs a name and url"
                );
            }
        }
        for bot in &self.bots {
            if bot.id.trim().is_empty() {
                anyhow::bail!("Configuration error: bots entries need a non-empty id");
            }
        }
        Ok(())
    }

}

/// Get the profile config path (~/.botboard/botboard.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Check if host binds to all network interfaces
pub(crate) fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> FileConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_file_config_parse_full() {
        let config = parse(
            r#"{
                "server": { "host": "127.0.0.1", "port": 9000 },
                "ingest": { "path": "/onebot", "token": "s3cret" },
                "liveness": { "sweep_interval_secs": 5, "timeout_secs": 20 },
                "probes": {
                    "interval_secs": 15,
                    "endpoints": [{ "name": "api", "url": "http://api.local/ping" }]
                },
                "stats": { "timezone": "Asia/Shanghai" },
                "bots": [{ "id": "10001", "nickname": "helper" }],
                "debug": true
            }"#,
        );
        let config = AppConfig::from_layers(&CliConfig::default(), config).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.ingest.path, "/onebot");
        assert_eq!(config.ingest.token.as_deref(), Some("s3cret"));
        assert_eq!(config.liveness.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.liveness.timeout, Duration::from_secs(20));
        assert_eq!(config.probes.interval, Duration::from_secs(15));
        assert_eq!(config.probes.timeout, Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS));
        assert_eq!(config.probes.endpoints.len(), 1);
        assert_eq!(config.probes.endpoints[0].name, "api");
        assert_eq!(config.calendar.to_string(), "Asia/Shanghai");
        assert_eq!(config.bots[0].nickname, "helper");
        assert!(config.debug);
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_layers(&CliConfig::default(), FileConfig::default()).unwrap();

        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.ingest.path, "/");
        assert!(config.ingest.token.is_none());
        assert_eq!(config.liveness.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.liveness.timeout, Duration::from_secs(60));
        assert_eq!(config.probes.endpoints[0].url, DEFAULT_PROBE_URL);
        assert_eq!(config.calendar, Calendar::Local);
        assert!(config.bots.is_empty());
        assert!(!config.debug);
        config.validate().unwrap();
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = parse(r#"{ "server": { "port": 9000 }, "ingest": { "token": "file" } }"#);
        let cli = CliConfig {
            host: Some("10.0.0.5".to_string()),
            port: Some(3000),
            ingest_token: Some("cli".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        };
        let config = AppConfig::from_layers(&cli, file).unwrap();

        assert_eq!(config.server.host, "10.0.0.5");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ingest.token.as_deref(), Some("cli"));
        assert_eq!(config.calendar, Calendar::utc());
    }

    #[test]
    fn test_nil_and_empty_path_mean_root() {
        for path in ["nil", "", "  "] {
            let file = FileConfig {
                ingest: Some(IngestFileConfig {
                    path: Some(path.to_string()),
                    token: Some(String::new()),
                }),
                ..Default::default()
            };
            let config = AppConfig::from_layers(&CliConfig::default(), file).unwrap();
            assert_eq!(config.ingest.path, "/");
            assert!(config.ingest.token.is_none(), "empty token disables auth");
        }
    }

    #[test]
    fn test_merge_later_layer_wins() {
        let mut base = parse(
            r#"{
                "server": { "host": "a", "port": 1 },
                "probes": { "endpoints": [{ "name": "x", "url": "http://x" }] },
                "bots": [{ "id": "1" }]
            }"#,
        );
        base.merge(parse(
            r#"{
                "server": { "port": 2 },
                "probes": { "endpoints": [] }
            }"#,
        ));

        let server = base.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("a"));
        assert_eq!(server.port, Some(2));
        assert_eq!(base.probes.unwrap().endpoints, Some(vec![]));
        assert_eq!(base.bots.unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_fields_collected() {
        let config = parse(r#"{ "sever": {}, "debug": false }"#);
        let extra = config.extra.as_object().unwrap();
        assert!(extra.contains_key("sever"));
        assert!(!extra.contains_key("debug"));
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let cli = CliConfig {
            timezone: Some("Nowhere/Special".to_string()),
            ..Default::default()
        };
        let err = AppConfig::from_layers(&cli, FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("stats.timezone"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let base = AppConfig::from_layers(&CliConfig::default(), FileConfig::default()).unwrap();

        let mut config = base.clone();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.server.host.clear();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.ingest.path = "onebot".to_string();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.ingest.path = "/api/v1/ws".to_string();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.liveness.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.probes.endpoints.push(ProbeEndpoint {
            name: "blank".to_string(),
            url: String::new(),
        });
        assert!(config.validate().is_err());

        let mut config = base;
        config.bots.push(KnownBot {
            id: " ".to_string(),
            nickname: String::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_known_bot_nickname_defaults_empty() {
        let config = parse(r#"{ "bots": [{ "id": "42" }] }"#);
        assert_eq!(config.bots.unwrap()[0].nickname, "");
    }

    #[test]
    fn test_is_all_interfaces() {
        assert!(is_all_interfaces("0.0.0.0"));
        assert!(is_all_interfaces("::"));
        assert!(is_all_interfaces("[::]"));
        assert!(!is_all_interfaces("127.0.0.1"));
    }
}

use std::collections::HashMap;
use std::fs;
use std::str::FromStr;

/// INI-style configuration file.
///
/// ```text
/// # relay.conf
/// [Server]
/// bind_addr = 0.0.0.0:8000
///
/// [Relay]
/// chat_history_limit = 500
/// require_shared_room = true
///
/// [TLS]
/// enabled = false
/// cert = certs/relay/cert.pem
/// key = certs/relay/key.pem
///
/// [Logging]
/// server_log_path = ~/roomrelay/logs
/// ```
#[derive(Debug)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Error reading file {path}: {e}"))?;
        Ok(Self::parse(&content))
    }

    /// Parses config text. Lines that are neither a section header nor a
    /// `key = value` pair are ignored.
    pub fn parse(content: &str) -> Self {
        let mut globals = HashMap::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim();
                current_section = Some(name.to_string());
                continue;
            }

            if let Some(pos) = line.find('=') {
                let key = line[..pos].trim().to_string();
                let value = line[pos + 1..].trim().trim_matches('"').to_string();

                match &current_section {
                    None => {
                        globals.insert(key, value);
                    }
                    Some(sec) => {
                        sections.entry(sec.clone()).or_default().insert(key, value);
                    }
                }
            }
        }
        Config { globals, sections }
    }

    pub fn empty() -> Self {
        Self {
            globals: HashMap::new(),
            sections: HashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty_or_default<'a>(
        &'a self,
        section: &str,
        key: &str,
        default: &'a str,
    ) -> &'a str {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .unwrap_or(default)
    }

    /// Parses `[section] key` as `T`.
    ///
    /// Missing keys yield `Ok(default)`; present but unparsable values are an
    /// error so a typo in the config file is not silently ignored.
    pub fn get_parsed_or<T: FromStr>(&self, section: &str, key: &str, default: T) -> Result<T, String> {
        match self.get_non_empty(section, key) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<T>()
                .map_err(|_| format!("invalid value for [{section}] {key}: {raw:?}")),
        }
    }

    /// Accepts `true/false`, `yes/no`, `on/off` and `1/0`.
    pub fn get_bool_or(&self, section: &str, key: &str, default: bool) -> Result<bool, String> {
        match self.get_non_empty(section, key) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(format!("invalid boolean for [{section}] {key}: {raw:?}")),
            },
        }
    }
}

// ---- Typed settings ------------------------------------------------------

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 1_000;
pub const DEFAULT_CERT_PATH: &str = "certs/relay/cert.pem";
pub const DEFAULT_KEY_PATH: &str = "certs/relay/key.pem";
pub const DEFAULT_LOG_PREFIX: &str = "relay_server";

/// Knobs of the relay core itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOptions {
    /// Per-room cap on stored chat messages; 0 disables the cap.
    pub chat_history_limit: usize,
    /// Drop signals between connections that are not in the same room.
    pub require_shared_room: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
            require_shared_room: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub enabled: bool,
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `None` means `logs/` next to the executable.
    pub dir: Option<String>,
    pub file_prefix: String,
    pub echo_stderr: bool,
}

/// Everything the `relay_server` binary needs, resolved from a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    pub bind_addr: String,
    pub relay: RelayOptions,
    pub tls: TlsSettings,
    pub log: LogSettings,
}

impl RelaySettings {
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let bind_addr = config
            .get_non_empty_or_default("Server", "bind_addr", DEFAULT_BIND_ADDR)
            .to_string();

        let relay = RelayOptions {
            chat_history_limit: config.get_parsed_or(
                "Relay",
                "chat_history_limit",
                DEFAULT_CHAT_HISTORY_LIMIT,
            )?,
            require_shared_room: config.get_bool_or("Relay", "require_shared_room", true)?,
        };

        let tls = TlsSettings {
            enabled: config.get_bool_or("TLS", "enabled", false)?,
            cert_path: config
                .get_non_empty_or_default("TLS", "cert", DEFAULT_CERT_PATH)
                .to_string(),
            key_path: config
                .get_non_empty_or_default("TLS", "key", DEFAULT_KEY_PATH)
                .to_string(),
        };

        let log = LogSettings {
            dir: config
                .get_non_empty("Logging", "server_log_path")
                .map(str::to_string),
            file_prefix: config
                .get_non_empty_or_default("Logging", "server_log_filename", DEFAULT_LOG_PREFIX)
                .to_string(),
            echo_stderr: config.get_bool_or("Logging", "echo_stderr", true)?,
        };

        Ok(Self {
            bind_addr,
            relay,
            tls,
            log,
        })
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        // An empty config only ever takes the default branches.
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            relay: RelayOptions::default(),
            tls: TlsSettings {
                enabled: false,
                cert_path: DEFAULT_CERT_PATH.to_string(),
                key_path: DEFAULT_KEY_PATH.to_string(),
            },
            log: LogSettings {
                dir: None,
                file_prefix: DEFAULT_LOG_PREFIX.to_string(),
                echo_stderr: true,
            },
        }
    }
}

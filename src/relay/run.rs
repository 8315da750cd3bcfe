use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, RelaySettings};
use crate::log::log_sink::LogSink;
use crate::relay::relay_server::RelayServer;
use crate::relay::tls::build_server_config;
use crate::sink_info;

/// Environment variable naming the config file when none is passed.
pub const CONFIG_ENV_VAR: &str = "ROOMRELAY_CONFIG";

/// Resolve settings from an explicit path, then `ROOMRELAY_CONFIG`, then
/// built-in defaults. A named file that cannot be read is an error; a
/// missing default is not.
pub fn load_settings(explicit: Option<&str>) -> Result<RelaySettings, String> {
    let path = explicit
        .map(str::to_owned)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().filter(|p| !p.is_empty()));

    match path {
        Some(p) => {
            let config = Config::load(&p)?;
            RelaySettings::from_config(&config)
        }
        None => Ok(RelaySettings::default()),
    }
}

/// Bind, optionally wrap in TLS, and serve forever.
pub fn run_relay_server(settings: &RelaySettings, log: Arc<dyn LogSink>) -> io::Result<()> {
    let mut server = RelayServer::bind(&settings.bind_addr, log.clone(), settings.relay.clone())?;

    if settings.tls.enabled {
        let tls = build_server_config(&settings.tls)?;
        sink_info!(
            log,
            "TLS enabled (cert {}, key {})",
            settings.tls.cert_path,
            settings.tls.key_path
        );
        server = server.with_tls(tls);
    } else if Path::new(&settings.tls.cert_path).exists() {
        sink_info!(
            log,
            "found {} but TLS is disabled; serving plain TCP",
            settings.tls.cert_path
        );
    }

    sink_info!(
        log,
        "chat history limit {}, shared room required for signals: {}",
        settings.relay.chat_history_limit,
        settings.relay.require_shared_room
    );
    server.run()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::fs;

    #[test]
    fn explicit_config_path_is_loaded() {
        let path = std::env::temp_dir().join(format!("roomrelay-run-{}.ini", std::process::id()));
        fs::write(
            &path,
            "[Server]\nbind_addr = 127.0.0.1:9100\n[Relay]\nchat_history_limit = 5\n",
        )
        .unwrap();

        let settings = load_settings(path.to_str()).unwrap();
        assert_eq!(settings.bind_addr, "127.0.0.1:9100");
        assert_eq!(settings.relay.chat_history_limit, 5);
        assert!(settings.relay.require_shared_room);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unreadable_explicit_path_is_an_error() {
        assert!(load_settings(Some("/no/such/roomrelay.ini")).is_err());
    }
}

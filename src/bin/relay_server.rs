use std::sync::Arc;
use std::{env, process};

use roomrelay::log::log_sink::LogSink;
use roomrelay::log::logger::Logger;
use roomrelay::relay::run::{CONFIG_ENV_VAR, load_settings, run_relay_server};

const LOG_QUEUE_CAP: usize = 4096;

fn usage(prog: &str) -> ! {
    eprintln!("Usage:");
    eprintln!("  {prog}                       # defaults, or ${CONFIG_ENV_VAR} if set");
    eprintln!("  {prog} [CONFIG_PATH]         # e.g. relay.conf");
    eprintln!("  {prog} [CONFIG_PATH] [ADDR]  # ADDR overrides [Server] bind_addr");
    eprintln!();
    eprintln!("When using cargo:");
    eprintln!("  cargo run --bin relay_server -- relay.conf 127.0.0.1:8000");
    process::exit(1);
}

fn main() {
    // --- Parse CLI args ----------------------------------------------------
    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("relay_server");

    let (config_path, addr_override) = match args.len() {
        0 | 1 => (None, None),
        2 if args[1] == "-h" || args[1] == "--help" => usage(prog),
        2 => (Some(args[1].as_str()), None),
        3 => (Some(args[1].as_str()), Some(args[2].clone())),
        _ => usage(prog),
    };

    let mut settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[relay_server] config error: {e}");
            process::exit(1);
        }
    };
    if let Some(addr) = addr_override {
        settings.bind_addr = addr;
    }

    // --- Start process logger ----------------------------------------------
    let logger = Logger::start_server(LOG_QUEUE_CAP, &settings.log);
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    eprintln!(
        "[relay_server] starting on {} (log file {})",
        settings.bind_addr,
        logger.file_path().display()
    );

    // --- Run relay (blocks) ------------------------------------------------
    if let Err(e) = run_relay_server(&settings, log_sink) {
        eprintln!("[relay_server] fatal: {e}");
        process::exit(1);
    }
}

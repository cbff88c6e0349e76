mod config;

use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use loadtune_audio::{Engine, ProcessSink};
use loadtune_types::PresetBank;

use config::Config;

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("loadtune")
        .join("loadtune.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = File::create(&log_path).unwrap_or_else(|_| {
        File::create("/tmp/loadtune.log").expect("Cannot create log file")
    });

    WriteLogger::init(log_level, simplelog::Config::default(), log_file)
        .expect("Failed to initialize logger");

    log::info!("loadtune starting (log level: {:?})", log_level);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let engine_config = Config::load().engine_config();

    if let Err(e) = PresetBank::new(engine_config.initial_preset).validate() {
        log::error!("preset catalog rejected: {e}");
        eprintln!("loadtune: preset catalog rejected: {e}");
        std::process::exit(1);
    }

    let sink = match ProcessSink::start() {
        Ok(sink) => sink,
        Err(e) => {
            log::error!("{e}");
            eprintln!("loadtune: {e}");
            std::process::exit(1);
        }
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed)) {
        log::warn!("could not install signal handler: {e}");
    }

    Engine::new(sink, engine_config).run(&cancel);
}

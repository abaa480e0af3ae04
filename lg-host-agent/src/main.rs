use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use lg_capture::{CaptureBackend, TestPatternBackend, ThreadedTestBackend};
use lg_producer::{NullHostOs, Orchestrator};
use lg_transport::SharedRegion;
use log::info;

#[cfg(windows)]
use crate::cleanup::ConsoleCleanup;
use crate::config::{CaptureBackendKind, ConfigManager};

mod cleanup;
mod config;
mod logger;

/// Entry point for the producer-side host agent. Initializes logging and
/// configuration, builds the shared region and a producer orchestrator
/// from the config, and drives it to completion on the main thread.
///
/// This binary plays the same role the teacher's `user-agent` does —
/// the minimal process that wires an architectural stack together and
/// stays resident — but the stack it wires together is the Looking
/// Glass transport/capture/postprocess/producer crates rather than a
/// ring listener, DB pipeline and file scanner.
fn main() -> anyhow::Result<()> {
    let config_path = find_config_file();
    let cfg_mgr = ConfigManager::new(&config_path)?;
    let cfg = cfg_mgr.get();

    logger::init_logger(cfg.log_level.parse().unwrap_or(log::LevelFilter::Info))?;
    info!("configuration loaded from {}", config_path.display());

    let region = Arc::new(SharedRegion::new_anonymous(cfg.region_size_bytes)?);
    let backend: Box<dyn CaptureBackend> = build_backend(&cfg.capture);
    let pp_chain = cfg.build_pp_chain();
    let orchestrator_config = cfg.orchestrator_config();

    let mut orchestrator = Orchestrator::new(region, orchestrator_config, backend, pp_chain, Arc::new(NullHostOs))?;
    info!("producer orchestrator starting ({}x{}, backend={:?})", cfg.capture.width, cfg.capture.height, cfg.capture.backend);

    // Ctrl+C / console close requests a clean shutdown through the
    // orchestrator's shared state rather than killing the process
    // outright, so `run`'s loop observes `Shutdown` and exits normally.
    #[cfg(windows)]
    let _cleanup = {
        let state = orchestrator.shared_state();
        ConsoleCleanup::new(move || state.shutdown())
    };

    let exit_code = orchestrator.run()?;
    info!("producer orchestrator exited with {exit_code:?}");
    std::process::exit(exit_code as i32);
}

fn build_backend(capture: &config::CaptureConfig) -> Box<dyn CaptureBackend> {
    match capture.backend {
        CaptureBackendKind::TestPattern => Box::new(TestPatternBackend::gradient(capture.width, capture.height)),
        CaptureBackendKind::ThreadedTest => Box::new(ThreadedTestBackend::gradient(capture.width, capture.height)),
    }
}

/// Find the `config.toml` path by checking an override environment
/// variable first and falling back to a file next to the running
/// executable, exactly as the teacher's `find_config_file` does.
fn find_config_file() -> PathBuf {
    if let Some(cfg) = env::var_os("LG_CONFIG") {
        return PathBuf::from(cfg);
    }

    let mut exe_path = env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
    exe_path.pop();
    exe_path.push("config.toml");
    exe_path
}

//! Process-wide logging setup. Same shape as the teacher's
//! `user_agent::logger` (one format function, file output under a log
//! directory) but built on `fern`, which is what the workspace actually
//! depends on.

use std::fs;

/// Installs the global logger. `fern::Dispatch::apply` registers it with
/// the `log` facade process-wide; there is no handle to keep alive.
pub fn init_logger(level: log::LevelFilter) -> anyhow::Result<()> {
    fs::create_dir_all("logs")?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{:<5}] [{}:{}] [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.file().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                std::thread::current().name().unwrap_or("<unnamed>"),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .chain(fern::log_file("logs/lg-host-agent.log")?)
        .apply()?;
    Ok(())
}

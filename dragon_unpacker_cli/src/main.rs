//! # dragon_unpacker_cli
//!
//! Part of the dragon_unpacker crate family.
//!
//! This is the command line application to unpack DRAGON MIDAS data.
//!
//! ## Use
//!
//! Make a template configuration with
//!
//! ```bash
//! dragon_unpacker_cli new -p config.yml
//! ```
//!
//! Edit it, then unpack the runs with
//!
//! ```bash
//! dragon_unpacker_cli -p config.yml
//! ```
//!
//! One progress bar is shown per worker. Details are written to `dragon_unpacker.log`.
use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use libdragon_unpacker::config::Config;
use libdragon_unpacker::process::{create_subsets, process_subset};
use libdragon_unpacker::worker_status::{WorkerPhase, WorkerStatus};

fn make_template_config(path: &Path) {
    match Config::default().write_config_file(path) {
        Ok(()) => log::info!("Done."),
        Err(e) => log::error!("Could not write template config: {e}"),
    }
}

/// Send the library's spdlog output to a file
fn init_file_logger() -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./dragon_unpacker.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn bar_message(status: &WorkerStatus) -> String {
    let phase = match status.phase {
        WorkerPhase::Unpacking => "Unpacking",
        WorkerPhase::Draining => "Draining",
        WorkerPhase::Finished => "Finished",
    };
    format!("Worker {} - {phase} run {}", status.worker_id, status.run_number)
}

fn main() {
    // Create a cli
    let matches = Command::new("dragon_unpacker_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }
    if let Err(e) = init_file_logger() {
        log::warn!("Could not create log file, library messages will be lost: {e}");
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration path is required (-p <path>)");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if let Err(e) = config.validate() {
        log::error!("{e}");
        return;
    }
    log::info!("Config successfully loaded.");
    log::info!("MIDAS Path: {}", config.midas_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );
    if config.singles_mode {
        log::info!("Singles mode");
    } else {
        log::info!(
            "Coincidence window: {} Queue timeout: {}",
            config.coinc_window,
            config.queue_timeout
        );
    }

    // Spawn the workers, one progress bar each
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let style = ProgressStyle::with_template("{msg:32} [{bar:40.cyan/blue}] {percent:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let mut bars: Vec<Option<ProgressBar>> = Vec::new();
    let mut workers = Vec::new();
    for (idx, subset) in create_subsets(&config).into_iter().enumerate() {
        if subset.is_empty() {
            bars.push(None);
            continue;
        }
        let pb = pb_manager.add(ProgressBar::new(100));
        pb.set_style(style.clone());
        pb.set_message(format!("Worker {idx} - Waiting"));
        bars.push(Some(pb));
        let conf = config.clone();
        let worker_tx = tx.clone();
        workers.push(std::thread::spawn(move || {
            process_subset(conf, worker_tx, idx, subset)
        }));
    }
    // Only the workers hold senders now, so the loop ends once they all finish
    drop(tx);

    for status in rx.iter() {
        if let Some(Some(pb)) = bars.get(status.worker_id) {
            pb.set_position((status.progress * 100.0) as u64);
            pb.set_message(bar_message(&status));
        }
    }

    for worker in workers {
        match worker.join() {
            Ok(Ok(())) => (),
            Ok(Err(e)) => log::error!("Unpacking failed with error: {e}"),
            Err(_) => log::error!("Failed to join an unpacking worker!"),
        }
    }
    for pb in bars.iter().flatten() {
        pb.finish();
    }

    log::info!("Done.");
}

use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use libhic_reducer::catalog::ManifestCatalog;
use libhic_reducer::config::Config;
use libhic_reducer::process::{process, process_single_activity, RunSummary};

const LOG_FILE_NAME: &str = "hic_reducer.log";

fn make_template_config(path: &Path) {
    match Config::default().write_config_file(path) {
        Ok(()) => log::info!("Done."),
        Err(e) => log::error!("Could not write template config: {e}"),
    }
}

fn report(summary: &RunSummary) {
    let counts = &summary.counts;
    log::info!(
        "{} components: {} parsed, {} copied, {} without EOS path, {} not filled",
        summary.components,
        counts.parsed,
        counts.reconciled,
        counts.skipped_empty_path,
        counts.skipped_parse_failure
    );
    log::info!(
        "Store {} is {}",
        summary.store_directory.display(),
        human_bytes::human_bytes(summary.store_bytes as f64)
    );
}

fn main() {
    // Create a cli
    let matches = Command::new("hic_reducer_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("single")
                .about("Reduce one activity into a store of its own")
                .arg(
                    Arg::new("hic")
                        .long("hic")
                        .required(true)
                        .value_parser(clap::value_parser!(u32))
                        .help("Component id of the HIC"),
                )
                .arg(
                    Arg::new("activity")
                        .long("activity")
                        .required(true)
                        .value_parser(clap::value_parser!(u32))
                        .help("Activity id"),
                ),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .global(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = vec![simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )];
    match File::create(LOG_FILE_NAME) {
        Ok(file) => loggers.push(simplelog::WriteLogger::new(
            simplelog::LevelFilter::Info,
            simplelog::Config::default(),
            file,
        )),
        Err(e) => eprintln!("Could not create log file {LOG_FILE_NAME}: {e}"),
    }
    let logger = simplelog::CombinedLogger::new(loggers);

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), *logger)
        .try_init()
        .expect("Could not create logging/progress!");
    log::set_max_level(log::LevelFilter::Info);

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration path is required (-p/--path)");
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
    log::info!("Config successfully loaded.");
    log::info!("Catalog Path: {}", config.catalog_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("HIC Type: {} Test: {}", config.hic_type.label(), config.test);
    log::info!("Resume: {}", config.resume);
    log::info!("Refresh Interval: {}", config.refresh_interval);
    if let Some(hdf_path) = config.hdf_path.as_ref() {
        log::info!("HDF5 Path: {}", hdf_path.to_string_lossy());
    }

    log::info!("Loading catalog...");
    let mut catalog = match ManifestCatalog::load(&config.catalog_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    if let Some(("single", args)) = matches.subcommand() {
        let (Some(hic_id), Some(act_id)) = (
            args.get_one::<u32>("hic").copied(),
            args.get_one::<u32>("activity").copied(),
        ) else {
            log::error!("Both --hic and --activity are required");
            return;
        };
        match process_single_activity(&config, &catalog, hic_id, act_id) {
            Ok(summary) => report(&summary),
            Err(e) => log::error!("Reduction failed with error: {e}"),
        }
        return;
    }

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}% {msg}") {
        pb.set_style(style);
    }
    let (tx, rx) = mpsc::channel();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(&config, &mut catalog, &tx));

    loop {
        // No UI here, so sleep for ~ 1 sec before trying to update
        std::thread::sleep(std::time::Duration::from_secs(1));
        if let Some(status) = rx.try_iter().last() {
            pb.set_position((status.progress * 100.0) as u64);
            pb.set_message(format!(
                "HIC {}: {} activities recorded",
                status.hic_id,
                status.counts.recorded()
            ));
        }

        if handle.is_finished() {
            match handle.join() {
                Ok(result) => match result {
                    Ok(summary) => {
                        log::info!("Successfully reduced data!");
                        report(&summary);
                    }
                    Err(e) => log::error!("Reduction failed with error: {e}"),
                },
                Err(_) => log::error!("Failed to join reduction task!"),
            }
            break;
        }
    }

    pb.finish();

    log::info!("Done.");
}

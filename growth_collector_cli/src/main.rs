use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use libgrowth_collector::config::Config;
use libgrowth_collector::diagnostics::Severity;

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

fn main() {
    // Create a cli
    let matches = Command::new("growth_collector_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
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

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );

        make_template_config(&config_path);
        log::info!("Done.");
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
    log::info!("Output Path: {}", config.output_dir.to_string_lossy());
    log::info!("Window: {} to {}", config.start_time, config.end_time);
    log::info!("Signals: {}", config.names.join(", "));
    log::info!("Force Reload: {}", config.force_reload);

    let collector = match config.make_collector() {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    let request = match config.make_request() {
        Ok(r) => r,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    // Check that the needed network shares are connected before committing
    // to a collection that would silently come back empty.
    let bad_paths = collector.find_bad_data_paths(&request);
    if !bad_paths.is_empty() {
        for path in &bad_paths {
            log::error!("Data path {} is not reachable!", path.to_string_lossy());
        }
        log::error!("Connect the missing shares and try again.");
        return;
    }

    log::info!("Collecting...");
    let data = match collector.collect(&request, config.force_reload) {
        Ok(d) => d,
        Err(e) => {
            log::error!("Collection failed with error: {e}");
            return;
        }
    };

    for diagnostic in collector.diagnostics().records() {
        if diagnostic.severity >= Severity::Error {
            log::warn!("Collected data may be compromised: {}", diagnostic.message);
        }
    }

    // Save the series with a progress bar
    let pb = pb_manager.add(ProgressBar::new(data.len() as u64));
    let mut failed = false;
    for series in data.values() {
        if let Err(e) = series.save(&config.output_dir) {
            log::error!("Failed to save '{}': {e}", series.name());
            failed = true;
        }
        pb.inc(1);
    }
    pb.finish();

    if failed {
        log::error!("Some signals could not be saved!");
    } else {
        log::info!(
            "Successfully collected {} signals to {}!",
            data.len(),
            config.output_dir.to_string_lossy()
        );
    }

    log::info!("Done.");
}

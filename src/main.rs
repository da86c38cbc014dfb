use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use log::{info, error, LevelFilter};

use clap::{arg, ArgAction, command, value_parser};
use clap::parser::ValueSource;
use simplelog::{ColorChoice, CombinedLogger, TerminalMode, TermLogger, WriteLogger, Config};

use project_map_lib::config::{parse_bounds, ServiceConfig};
use project_map_lib::http::spawn_service;
use project_map_lib::CatalogModel;


fn run_service(config: ServiceConfig) -> project_map_lib::Result<()> {

    let start = Instant::now();

    let catalog = match &config.catalog {
        Some(path) => {
            info!("loading projects from {}...", path.display());
            CatalogModel::load(path, config.index)?
        }
        None => CatalogModel::new(config.index)?,
    };
    let catalog = Arc::new(catalog);
    info!("the catalog is ready in {:?}, {:?}", start.elapsed(), catalog.stats());

    let control = spawn_service(catalog, config.addr)?;

    // serve until Ctrl-C
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    if let Err(e) = rt.block_on(tokio::signal::ctrl_c()) {
        error!("cannot listen for ctrl-c: {e}");
    }

    info!("stopping");
    control.stop();
    Ok(())
}


fn parse_command_line() -> Result<ServiceConfig, String> {
    let matches = command!()
        .next_line_help(true)
        .arg(
            arg!(--loglevel <LEVEL>)
                .required(false)
                .default_value("info")
                .value_parser(["trace", "debug", "info", "warn", "error", "off" ])
                .action(ArgAction::Set)
        )
        .arg(
            arg!(--logfile [FILE_NAME])
                .required(false)
                .default_value("project_map.log")
                .action(ArgAction::Set)
                .help("Enables logging to a file. Disabled by default")
        )
        .arg(
            arg!(-q --quiet)
                .required(false)
                .action(ArgAction::SetTrue)
                .help("Disables output to the terminal")
        )
        .arg(
            arg!(--bind <ADDRESS>)
                .required(false)
                .default_value("127.0.0.1")
                .value_parser(value_parser!(std::net::IpAddr))
                .help("Address the HTTP API listens on")
        )
        .arg(
            arg!(--port <PORT>)
                .required(false)
                .default_value("3000")
                .value_parser(value_parser!(u16))
        )
        .arg(
            arg!(--catalog <FILE>)
                .required(false)
                .value_parser(value_parser!(PathBuf))
                .help("JSON array of projects to load at startup")
        )
        .arg(
            arg!(--bounds <BOUNDS>)
                .required(false)
                .help("Indexed area as min_lng,min_lat,max_lng,max_lat. Derived from the catalog by default")
        )
        .arg(
            arg!(--capacity <N>)
                .required(false)
                .default_value("4")
                .value_parser(value_parser!(usize))
                .help("Points a quadtree leaf holds before it splits")
        )
        .arg(
            arg!(--"max-depth" <N>)
                .required(false)
                .default_value("10")
                .value_parser(value_parser!(usize))
        )
        .get_matches();

    initialize_logging(&matches);

    let mut config = ServiceConfig::default();

    if let (Some(ip), Some(port)) = (matches.get_one::<std::net::IpAddr>("bind"), matches.get_one::<u16>("port")) {
        config.addr = (*ip, *port).into();
    }
    config.catalog = matches.get_one::<PathBuf>("catalog").cloned();
    if let Some(capacity) = matches.get_one::<usize>("capacity") {
        config.index.capacity = *capacity;
    }
    if let Some(max_depth) = matches.get_one::<usize>("max-depth") {
        config.index.max_depth = *max_depth;
    }
    if let Some(bounds) = matches.get_one::<String>("bounds") {
        config.index.bounds = Some(parse_bounds(bounds).map_err(|e| e.to_string())?);
    }

    Ok(config)
}


fn initialize_logging(matches: &clap::ArgMatches) {
    let loglevel = match matches.get_one::<String>("loglevel") {
        None => LevelFilter::Off,
        Some(level) => {
            match level.as_str() {
                "trace" => LevelFilter::Trace,
                "debug" => LevelFilter::Debug,
                "info" => LevelFilter::Info,
                "warn" => LevelFilter::Warn,
                "error" => LevelFilter::Error,
                "off" => LevelFilter::Off,
                _ => unreachable!(),
            }
        }
    };
    let quiet = matches.get_flag("quiet");
    let term_loglevel = if quiet { LevelFilter::Off } else { loglevel };

    let logfile = match (matches.value_source("logfile"), matches.get_one::<String>("logfile")) {
        (Some(ValueSource::CommandLine), Some(file_name)) => {
            Some(file_name)
        },
        _ => None,
    };

    let term_logger = TermLogger::new(term_loglevel, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);
    let result = match logfile.map(File::create) {
        Some(Ok(file)) => CombinedLogger::init(
            vec![
                term_logger,
                WriteLogger::new(loglevel, Config::default(), file)
            ]
        ),
        Some(Err(e)) => {
            eprintln!("cannot create log file: {e}");
            CombinedLogger::init(vec![term_logger])
        }
        None => CombinedLogger::init(vec![term_logger]),
    };

    if let Err(e) = result {
        eprintln!("cannot initialize logging: {e}");
    }
}

fn main() -> ExitCode {
    let config = match parse_command_line() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE
        }
    };

    match run_service(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

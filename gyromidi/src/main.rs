use std::fs::File;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use gyromidi_core::midi::{list_input_ports, list_output_ports, MidiInputListener, MidiOutSink};
use gyromidi_core::{Config, Engine, EngineResult};

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gyromidi")
        .join("gyromidi.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path).or_else(|_| File::create("/tmp/gyromidi.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("gyromidi: cannot create log file: {}", e);
            return;
        }
    };

    if let Err(e) = WriteLogger::init(log_level, simplelog::Config::default(), log_file) {
        eprintln!("gyromidi: cannot initialise logging: {}", e);
        return;
    }

    log::info!("gyromidi starting (log level: {:?})", log_level);
}

fn print_ports() {
    println!("MIDI outputs:");
    for port in list_output_ports() {
        println!("  {}: {}", port.index, port.name);
    }
    println!("MIDI inputs:");
    for port in list_input_ports() {
        println!("  {}: {}", port.index, port.name);
    }
}

fn run(config: Config) -> EngineResult {
    let sink = MidiOutSink::connect(config.midi_output())?;
    println!("gyromidi: sending to {}", sink.port_name());

    let mut engine = Engine::start(config.settings(), Arc::new(sink))?;

    // Note set and clock come from MIDI input when a port is configured
    let listener = match config.midi_input() {
        Some(selector) => match MidiInputListener::connect(Some(selector), engine.sender()) {
            Ok(listener) => {
                println!("gyromidi: listening on {}", listener.port_name());
                Some(listener)
            }
            Err(e) => {
                log::warn!(target: "midi", "MIDI input disabled: {}", e);
                eprintln!("gyromidi: MIDI input disabled: {}", e);
                None
            }
        },
        None => None,
    };

    println!("gyromidi: running, press Enter to quit");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);

    drop(listener);
    engine.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    if args.iter().any(|a| a == "--list") {
        print_ports();
        return ExitCode::SUCCESS;
    }

    let config_path = args
        .iter()
        .position(|a| a == "--config" || a == "-c")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);
    let config = match config_path {
        Some(path) => match Config::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("gyromidi: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::load(),
    };

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("gyromidi: {}", e);
            ExitCode::FAILURE
        }
    }
}

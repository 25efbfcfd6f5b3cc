//! `main.rs` contains the command-line interface for bibstream. It collects
//! the values and options, sets up the logger for debug builds, assembles
//! the configuration, and passes the configuration to the main function.
#[macro_use]
extern crate slog;

use ansi_term::Color;
use bibstream::config::{BibCommand, BibConfig, Output, ParseConfig};
use clap::{crate_version, App, Arg, SubCommand};
use slog::{debug, Drain, Level};
use std::{fs::OpenOptions, process, sync::Mutex};

fn main() -> Result<(), String> {
    // Get the command-line arguments and options
    let matches = App::new("bibstream")
        .version(crate_version!())
        .about("A streaming BibTeX-to-JSON converter")
        .subcommand_negates_reqs(true)
        .arg(
            Arg::with_name("input")
                .value_name("INPUT FILE")
                .help("The .bib file to process")
                .index(1)
                .required(true),
        )
        .arg(
            Arg::with_name("output")
                .value_name("OUTPUT FILE")
                .help("The .json output (blank outputs to terminal)")
                .index(2)
                .required(false),
        )
        .arg(
            Arg::with_name("macros")
                .short('m')
                .long("macros")
                .value_name("MACRO FILE")
                .help("A RON file containing user-provided string definitions"),
        )
        .arg(
            Arg::with_name("pretty")
                .short('p')
                .long("pretty")
                .takes_value(false)
                .help("Pretty-print the JSON output"),
        )
        .arg(
            Arg::with_name("debug")
                .short('d')
                .long("debug")
                .takes_value(false)
                .help("Outputs debug log to bibstream-log.json")
                .hidden_short_help(true)
                .hidden_long_help(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short('v')
                .long("verbose")
                .value_name("NUMBER")
                .help("Verbosity level between 0 and 5")
                .hidden_short_help(true)
                .hidden_long_help(true)
                .default_value("1"),
        )
        .subcommand(SubCommand::with_name("mf").about("For creating a blank macro file"))
        .get_matches();

    // Setup the logger.
    //
    // If the debug flag is set, the log is output to a file
    // `bibstream-log.json`. Otherwise, all logging goes to the terminal.
    let debug = matches.is_present("debug");
    let min_log_level = match matches.value_of("verbose").unwrap() {
        "0" => Level::Critical,
        "1" => Level::Error,
        "2" => Level::Warning,
        "3" => Level::Info,
        "4" => Level::Debug,
        "5" => Level::Trace,
        _ => Level::Info,
    };

    let term_decorator = slog_term::TermDecorator::new().build();
    let term_drain = slog_term::CompactFormat::new(term_decorator).build().fuse();
    let term_drain = term_drain.filter_level(min_log_level).fuse();

    let _guard: slog_scope::GlobalLoggerGuard = if debug {
        // Setup the file AND terminal loggers
        let log_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open("./bibstream-log.json")
            .unwrap();
        let file_drain = slog_json::Json::new(log_file)
            .set_pretty(true)
            .add_default_keys()
            .build()
            .fuse();
        let file_drain = file_drain.filter_level(Level::Trace).fuse();
        let dual_logger = slog::Logger::root(
            Mutex::new(slog::Duplicate(term_drain, file_drain)).fuse(),
            o!("version" => crate_version!()),
        );
        slog_scope::set_global_logger(dual_logger)
    } else {
        // Setup just the terminal logger
        let term_logger = slog::Logger::root(
            Mutex::new(term_drain).fuse(),
            o!("version" => crate_version!()),
        );
        slog_scope::set_global_logger(term_logger)
    };

    debug!(slog_scope::logger(), "Logger setup");

    // Setup the configuration variables.
    //
    // Subcommands
    if matches.subcommand_name() == Some("mf") {
        let config = BibConfig::new(BibCommand::NewMacroFile, None, None);
        return bibstream::bibstream(config);
    }

    // Files
    let input = matches.value_of("input").unwrap();
    let output = matches.value_of("output");

    // Parser options
    let macros = matches.value_of("macros");
    let pretty = matches.is_present("pretty");

    // Determine the output
    let output_option = match output {
        Some(f) => {
            if f.len() > 5 && &f[f.len() - 5..] == ".json" {
                Output::Json
            } else {
                eprintln!(
                    "{} The output file must have a .json extension. You used {}",
                    Color::Red.paint("ERRO"),
                    Color::Blue.paint(f)
                );
                process::exit(1);
            }
        }
        None => Output::StandardOut,
    };

    // Create the configuration
    let parse_config = ParseConfig::new(input, output, macros, pretty);
    let config = BibConfig::new(BibCommand::Main, Some(output_option), Some(parse_config));

    // Run the program.
    let _ = bibstream::bibstream(config);

    Ok(())
}

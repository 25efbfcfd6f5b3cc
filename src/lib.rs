//! Contains the main bibstream function. Reads a BibTeX stream and outputs
//! the fully-resolved entries as JSON.
//!
//! One entry in a `.bib` file looks like this:
//!
//! ```tex
//! @book{works:4,
//!   author = {Shakespeare, William},
//!   title  = {Sonnets},
//! }
//! ```
//!
//! The parser resolves `@string` macros, `#`-concatenation, and `crossref`
//! inheritance between entries before anything is handed back, so consumers
//! see finished field maps. The API is built around iterating over the
//! stream's entries:
//!
//! ```rust
//! use bibstream::BibIterator;
//! use std::io::Cursor;
//!
//! let src = "@book{b1, title = \"Root\"}\n@inbook{c1, crossref = \"b1\"}";
//! for entry in BibIterator::new(Cursor::new(src), None) {
//!     println!("{}/{}: {:?}", entry.entry_type, entry.key, entry.fields);
//! }
//! ```

pub mod config;
mod crossref;
mod fs;
mod lexer;
pub mod macros;
mod parser;
mod reader;
mod render;

pub use crate::parser::{BibEntry, BibIterator};

use ansi_term::Color;
use config::{BibCommand, BibConfig, Output};
use fs::{load_file, open_file};
use slog::{debug, error, o};
use std::{path::Path, process};

/// The main bibstream function.
pub fn bibstream(config: BibConfig) -> Result<(), String> {
    // Check subcommands.
    if let BibCommand::NewMacroFile = config.command {
        debug!(slog_scope::logger(), "Creating blank macro file");
        fs::new_macro_file();
        return Ok(());
    }

    eprintln!("{} Starting bibstream...", Color::Green.paint("INFO"));

    // Create paths for the input, output, etc. The parse config is always
    // present for the main command.
    let parse_config = config.parse_config.as_ref().unwrap();
    let input = Path::new(parse_config.input);
    let output = parse_config.output.map(Path::new);

    // Load the macro file, if any
    let seed = match parse_config.macros {
        Some(m) => {
            let contents = match slog_scope::scope(
                &slog_scope::logger().new(o!("fn" => "load_file()")),
                || load_file(Path::new(&m)),
            ) {
                Ok(c) => c,
                Err(e) => {
                    error!(slog_scope::logger(), "Macro file load error: {}", e);
                    eprintln!("{} Macro file load error: {}", Color::Red.paint("ERRO"), e);
                    process::exit(1);
                }
            };
            match slog_scope::scope(
                &slog_scope::logger().new(o!("fn" => "build_macro_table()")),
                || macros::build_macro_table(&contents),
            ) {
                Ok(t) => Some(t),
                Err(e) => {
                    error!(slog_scope::logger(), "Macro file parse error: {}", e);
                    eprintln!("{} Macro file parse error: {}", Color::Red.paint("ERRO"), e);
                    process::exit(1);
                }
            }
        }
        None => None,
    };

    // Open the input stream
    let source = match slog_scope::scope(
        &slog_scope::logger().new(o!("fn" => "open_file()")),
        || open_file(input),
    ) {
        Ok(s) => s,
        Err(e) => {
            error!(slog_scope::logger(), "Input open error: {}", e);
            eprintln!("{} Input open error: {}", Color::Red.paint("ERRO"), e);
            process::exit(1);
        }
    };

    // Run the parser
    eprintln!("{} Parsing...", Color::Green.paint("INFO"));

    let entries: Vec<BibEntry> = slog_scope::scope(
        &slog_scope::logger().new(o!("fn" => "BibIterator::next()")),
        || BibIterator::new(source, seed).collect(),
    );

    eprintln!(
        "{} Resolved {} entries",
        Color::Green.paint("INFO"),
        entries.len()
    );

    // Render the output
    let json = match slog_scope::scope(
        &slog_scope::logger().new(o!("fn" => "render()")),
        || render::render(&entries, parse_config.pretty),
    ) {
        Ok(j) => j,
        Err(e) => {
            error!(slog_scope::logger(), "Render error: {}", e);
            eprintln!("{} Render error: {}", Color::Red.paint("ERRO"), e);
            process::exit(1);
        }
    };

    // If no output file was given, print to the terminal; otherwise save.
    if config.output.as_ref().unwrap() == &Output::StandardOut {
        println!("{}", json);
        return Ok(());
    }

    // This can safely unwrap because an output must have been provided for
    // config.output to be set to Json
    fs::save_file(output.unwrap(), &json)
}

//! Functions for interacting with the file system.

use ansi_term::Color;
use slog::debug;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Load a file into a string.
///
/// Used for the macro file, which is small and read all at once. The input
/// stream goes through [`open_file`] instead.
pub fn load_file(path: &Path) -> Result<String, String> {
    debug!(
        slog_scope::logger(),
        "Loading file {}...",
        path.to_string_lossy()
    );

    match fs::read_to_string(path) {
        Ok(r) => {
            debug!(
                slog_scope::logger(),
                "File {} loaded.",
                path.to_string_lossy()
            );
            Ok(r)
        }
        Err(e) => {
            let err_msg = format!("error reading the file {}—{}", path.to_string_lossy(), e);
            Err(err_msg)
        }
    }
}

/// Open a file for buffered streaming.
///
/// The input `.bib` file is never pulled into memory whole; the parser
/// reads it incrementally through this handle.
pub fn open_file(path: &Path) -> Result<BufReader<File>, String> {
    debug!(
        slog_scope::logger(),
        "Opening file {}...",
        path.to_string_lossy()
    );

    match File::open(path) {
        Ok(f) => Ok(BufReader::new(f)),
        Err(e) => {
            let err_msg = format!("error opening the file {}—{}", path.to_string_lossy(), e);
            Err(err_msg)
        }
    }
}

/// Save a string in a file. Used when outputting JSON to a file.
pub fn save_file(path: &Path, output: &str) -> Result<(), String> {
    debug!(slog_scope::logger(), "Saving {}...", path.to_string_lossy());
    eprintln!(
        "{} Saving {}...",
        Color::Green.paint("INFO"),
        Color::Blue.paint(path.to_string_lossy())
    );

    match fs::write(path, output) {
        Ok(_) => {
            debug!(
                slog_scope::logger(),
                "File {} saved.",
                path.to_string_lossy()
            );
            eprintln!("{} Done", Color::Green.paint("INFO"));
            Ok(())
        }
        Err(e) => {
            let err_msg = format!("Error writing the file {}—{}", path.to_string_lossy(), e);
            Err(err_msg)
        }
    }
}

/// Create a blank macro file.
///
/// Creates a blank macro file that users can then fill in with their own
/// string definitions.
pub fn new_macro_file() {
    eprintln!(
        "{} Creating blank macro file ({})",
        Color::Green.paint("INFO"),
        Color::Blue.paint("blank-macros.ron")
    );

    let blank_ron = r#"// Enter your own string definitions into this document.
// All entries must come between the two curly brackets, which start and end
// the file. Each entry should include two quoted strings, separated by a
// colon. The first string is the macro name as it appears bare in field
// values. The second string is the text it stands for. Put each macro on a
// separate line, with commas after every line. Below is an example:
//
// {
//  "jan":"January",
//  "feb":"February",
// }
//
// There is also a placeholder example below. Feel free to replace that with
// your own macros.

{
    "macroname":"Replacement text",
}
"#;

    fs::write("blank-macros.ron", blank_ron).expect("Unable to write blank macro file");
}

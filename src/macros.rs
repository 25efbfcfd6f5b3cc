//! This module contains functionality related to user macro files. A macro
//! file pre-seeds the `@string` table with definitions the input stream
//! doesn't carry itself (month names are the usual case).

use ron::de::from_str;
use slog::debug;
use std::collections::HashMap;

/// Macro name (lowercase) → resolved text value.
pub type MacroTable = HashMap<String, String>;

/// Build the macro table from a RON macro file.
///
/// Names are lowercased on the way in; macro references are
/// case-insensitive.
pub fn build_macro_table(input: &str) -> Result<MacroTable, String> {
    match from_str::<MacroTable>(input) {
        Ok(m) => {
            debug!(slog_scope::logger(), "Macro file parsed");
            Ok(m.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect())
        }
        Err(e) => {
            let err_msg = format!("error deserializing the macro file—{}", e);
            Err(err_msg)
        }
    }
}

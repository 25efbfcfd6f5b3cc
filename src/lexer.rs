//! This module contains the value and field lexers. They read one field
//! value (or one `name = value` pair) from the current stream position,
//! resolving macro references and `#`-concatenation along the way.

use crate::macros::MacroTable;
use crate::reader::Reader;
use slog::{debug, trace};
use std::io::BufRead;

/// Characters allowed in bare macro tokens and field names.
///
/// The grammar is word characters; dashes also show up in the wild (e.g.
/// `archive-prefix`), so they're allowed too.
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Consume whitespace up to the next meaningful character.
pub fn skip_whitespace<R: BufRead>(reader: &mut Reader<R>) {
    while let Some(c) = reader.peek() {
        if !c.is_whitespace() {
            break;
        }
        reader.read_char();
    }
}

/// Read one fully-resolved field value.
///
/// A value is one or more components joined by `#`: balanced `{...}` or
/// `"..."` groups (returned verbatim, no macro resolution inside) and bare
/// macro tokens (integers pass through, anything else is looked up in the
/// macro table). Reading stops at a terminating character without consuming
/// it, or when the component run ends.
///
/// Returns `None` when the value is empty or an unresolvable macro leaves
/// nothing to accumulate; the caller treats that as "field absent."
pub fn read_value<R: BufRead>(
    reader: &mut Reader<R>,
    macros: &MacroTable,
    terminators: &[char],
) -> Option<String> {
    let mut value: Option<String> = None;
    let mut concat = true;

    loop {
        skip_whitespace(reader);

        let c = match reader.peek() {
            Some(c) => c,
            None => return value,
        };

        if terminators.contains(&c) {
            // Leave the terminator for the entry lexer.
            return value;
        }

        if c == '#' {
            reader.read_char();
            concat = true;
            continue;
        }

        if value.is_some() && !concat {
            // A second component with no concatenation operator ends the
            // value; whatever follows is the entry lexer's problem.
            return value;
        }

        let component = if c == '"' || c == '{' {
            reader.read_char();
            Some(read_group(reader, c))
        } else {
            read_macro_token(reader, macros)
        };

        match component {
            Some(text) => {
                let mut accumulated = value.unwrap_or_default();
                accumulated.push_str(&text);
                value = Some(accumulated);
            }
            None => return value,
        }

        concat = false;
    }
}

/// Read a balanced group opened by `{` or `"`.
///
/// Brace nesting must return to depth zero before the group closes; escaped
/// braces don't count toward the depth. Braces nest inside quoted groups
/// too, so a `"` only closes at depth zero. Content is returned verbatim,
/// including inner braces and escape characters. If the stream ends before
/// the group closes, whatever accumulated so far is returned.
pub fn read_group<R: BufRead>(reader: &mut Reader<R>, open: char) -> String {
    let mut contents = String::new();
    let mut depth: i32 = 0;
    let mut escaped = false;

    while let Some(c) = reader.read_char() {
        if escaped {
            contents.push(c);
            escaped = false;
            continue;
        }

        match c {
            '\\' => {
                contents.push(c);
                escaped = true;
            }
            '{' => {
                depth += 1;
                contents.push(c);
            }
            '}' => {
                if open == '{' && depth == 0 {
                    return contents;
                }
                depth -= 1;
                contents.push(c);
            }
            '"' if open == '"' && depth == 0 => {
                return contents;
            }
            _ => contents.push(c),
        }
    }

    trace!(
        slog_scope::logger(),
        "Stream ended inside a group opened with {:?}",
        open
    );
    contents
}

/// Read a bare macro token and resolve it.
///
/// An integer token is its own value. Anything else is looked up in the
/// macro table (names are case-insensitive). An unknown macro resolves to
/// `None` and is logged; the field ends up dropped rather than erroring.
fn read_macro_token<R: BufRead>(reader: &mut Reader<R>, macros: &MacroTable) -> Option<String> {
    let mut token = String::new();

    while let Some(c) = reader.peek() {
        if !is_name_char(c) {
            break;
        }
        token.push(c);
        reader.read_char();
    }

    if token.is_empty() {
        return None;
    }

    if let Ok(number) = token.parse::<i64>() {
        return Some(number.to_string());
    }

    match macros.get(&token.to_lowercase()) {
        Some(text) => Some(text.clone()),
        None => {
            debug!(
                slog_scope::logger(),
                "No definition for string '{}'; dropping value", token
            );
            None
        }
    }
}

/// Read the next `name = value` pair.
///
/// Returns `None` when a terminating character or anything else unexpected
/// appears where a field name should be; the unexpected character is left
/// on the stream for the caller. A field whose value could not be resolved
/// comes back as `(name, None)`.
pub fn next_field<R: BufRead>(
    reader: &mut Reader<R>,
    macros: &MacroTable,
    terminators: &[char],
) -> Option<(String, Option<String>)> {
    let mut name = String::new();
    let mut name_done = false;

    loop {
        let c = reader.peek()?;

        if terminators.contains(&c) {
            return None;
        }

        if c.is_whitespace() {
            reader.read_char();
            if !name.is_empty() {
                name_done = true;
            }
            continue;
        }

        if !name_done && is_name_char(c) {
            name.push(c);
            reader.read_char();
            continue;
        }

        if c == '=' && !name.is_empty() {
            reader.read_char();
            let value = read_value(reader, macros, terminators);
            return Some((name.to_lowercase(), value));
        }

        // Something unexpected where a field name should be, usually the
        // closing brace of the entry.
        return None;
    }
}

//! This module contains the entry parser and the pull-based iterator that
//! drives it. Entries are read one `@type{key, ...}` block at a time;
//! entries waiting on a cross-reference are held back and released once
//! their parent appears (or unsupplemented at end of stream if it never
//! does).

use crate::crossref;
use crate::lexer;
use crate::macros::MacroTable;
use crate::reader::Reader;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use slog::{debug, trace};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::collections::hash_map::Entry;
use std::io::BufRead;

/// How much raw text to pull at a time while scanning for the next `@`.
const CHUNK_SIZE: usize = 4096;

/// Entry types that are never records.
const IGNORE_TYPES: [&str; 2] = ["comment", "preamble"];

/// Field name reserved for internal use; dropped if it appears in input.
const RESERVED_FIELD: &str = "_itemkey";

lazy_static! {
    /// Matches the head of an entry after its `@` has been consumed:
    /// the type, the opening brace or paren, the key, and the separator
    /// (`,` for records, `=` for string definitions).
    static ref ENTRY_HEADER: Regex =
        Regex::new(r"^\s*(?P<type>\w+)\s*(?P<open>[({])\s*(?P<key>[^\s,={}()]+)\s*(?P<sep>[,=])")
            .unwrap();
}

/// One resolved entry from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BibEntry {
    /// Entry type, lowercase, e.g. "book".
    #[serde(rename = "type")]
    pub entry_type: String,
    /// The citation key as written. Matching is case-insensitive.
    pub key: String,
    /// Field name (lowercase) → resolved value.
    pub fields: BTreeMap<String, String>,
}

/// What one raw read attempt produced.
enum Scan {
    /// A fully-resolved entry, ready to yield.
    Entry(BibEntry),
    /// An entry parked until its crossref parent appears.
    Deferred,
    /// A macro definition, ignored type, or malformed block; keep reading.
    Skipped,
    /// No more `@` in the stream.
    End,
}

/// A single-pass iterator over the entries of one BibTeX stream.
///
/// Entries come back fully resolved: macros substituted, values
/// concatenated, and crossref fields inherited. Because forward references
/// are held back until their parent appears, yield order can differ from
/// stream order.
pub struct BibIterator<R> {
    reader: Reader<R>,
    /// Macro table; `@string` definitions land here, first one wins.
    strings: MacroTable,
    /// Every yielded entry, by lowercase key, for crossref lookups.
    resolved: HashMap<String, BibEntry>,
    /// Every accepted key, for duplicate detection (includes deferred
    /// entries not yet in `resolved`).
    known_keys: HashSet<String>,
    /// Parent key → children waiting on it, in stream order.
    pending: HashMap<String, Vec<BibEntry>>,
    /// Parent keys whose pending slots were first created, in order. Used
    /// to flush orphans deterministically at end of stream.
    pending_order: Vec<String>,
    /// Parent keys whose children can be released, drained FIFO.
    releasable: VecDeque<String>,
    exhausted: bool,
}

impl<R: BufRead> BibIterator<R> {
    /// Create an iterator over a buffered source. `seed` pre-populates the
    /// macro table (user-supplied definitions); `@string` entries in the
    /// stream never override it.
    pub fn new(source: R, seed: Option<MacroTable>) -> BibIterator<R> {
        BibIterator {
            reader: Reader::new(source),
            strings: seed.unwrap_or_default(),
            resolved: HashMap::new(),
            known_keys: HashSet::new(),
            pending: HashMap::new(),
            pending_order: Vec::new(),
            releasable: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Consume raw input up to and including the next `@`.
    fn scan_to_entry(&mut self) -> bool {
        while let Some(text) = self.reader.read(CHUNK_SIZE) {
            if let Some(i) = text.find('@') {
                self.reader.push(&text[i + 1..]);
                return true;
            }
        }
        false
    }

    /// Register a `@string` definition. The first definition of a name
    /// wins; redefinitions are logged and ignored.
    fn read_string_definition(&mut self, name: &str, rest_of_line: &str) -> Scan {
        self.reader.push_line(rest_of_line);
        let value = lexer::read_value(&mut self.reader, &self.strings, &['@', ',', '}', ')']);

        let name = name.to_lowercase();
        match value {
            Some(value) => match self.strings.entry(name.clone()) {
                Entry::Vacant(slot) => {
                    debug!(
                        slog_scope::logger(),
                        "Found string definition for '{}'", name
                    );
                    slot.insert(value);
                }
                Entry::Occupied(_) => {
                    debug!(
                        slog_scope::logger(),
                        "Already have a definition for string '{}'", name
                    );
                }
            },
            None => {
                debug!(
                    slog_scope::logger(),
                    "String definition for '{}' has no usable value", name
                );
            }
        }

        Scan::Skipped
    }

    /// Read the field list of one entry. The opening brace/paren and key
    /// have already been consumed.
    fn read_fields(&mut self, key: &str, close: char) -> BTreeMap<String, String> {
        let terminators = ['@', ',', close];
        let mut fields: BTreeMap<String, String> = BTreeMap::new();

        loop {
            match lexer::next_field(&mut self.reader, &self.strings, &terminators) {
                Some((name, Some(value))) => {
                    if name == RESERVED_FIELD {
                        debug!(
                            slog_scope::logger(),
                            "Field name '{}' is reserved; dropping it", name
                        );
                    } else if fields.contains_key(&name) {
                        debug!(
                            slog_scope::logger(),
                            "Field '{}' already defined for entry with key '{}'", name, key
                        );
                    } else {
                        trace!(slog_scope::logger(), "Read field '{}'", name);
                        fields.insert(name, value);
                    }
                }
                Some((name, None)) => {
                    debug!(
                        slog_scope::logger(),
                        "Dropping field '{}' of entry '{}': no usable value", name, key
                    );
                }
                None => break,
            }

            // One comma separates fields; anything else ends the entry.
            lexer::skip_whitespace(&mut self.reader);
            match self.reader.peek() {
                Some(',') => {
                    self.reader.read_char();
                }
                _ => break,
            }
        }

        fields
    }

    /// Read one raw entry starting at the next `@`.
    ///
    /// The closing delimiter is left on the stream; everything up to the
    /// next `@` is ignored on the following read anyway.
    fn read_entry(&mut self) -> Scan {
        if !self.scan_to_entry() {
            return Scan::End;
        }

        let line = match self.reader.read_line() {
            Some(line) => line,
            None => return Scan::End,
        };

        let caps = match ENTRY_HEADER.captures(&line) {
            Some(caps) => caps,
            None => {
                debug!(slog_scope::logger(), "Don't know what to do with '@{}'", line);
                self.reader.push_line(&line);
                return Scan::Skipped;
            }
        };

        let entry_type = caps["type"].to_lowercase();
        let key = caps["key"].to_string();
        let sep = &caps["sep"];
        let header_len = caps.get(0).map_or(0, |m| m.end());

        if IGNORE_TYPES.contains(&entry_type.as_str()) {
            trace!(slog_scope::logger(), "Ignoring '@{}' block", entry_type);
            self.reader.push_line(&line);
            return Scan::Skipped;
        }

        if entry_type == "string" && sep == "=" {
            return self.read_string_definition(&key, &line[header_len..]);
        }

        if sep != "," {
            debug!(slog_scope::logger(), "Don't know what to do with '@{}'", line);
            self.reader.push_line(&line);
            return Scan::Skipped;
        }

        let key_lower = key.to_lowercase();
        if self.known_keys.contains(&key_lower) {
            debug!(
                slog_scope::logger(),
                "Already have entry with key '{}'", key
            );
            self.reader.push_line(&line);
            return Scan::Skipped;
        }

        self.reader.push_line(&line[header_len..]);
        let close = if &caps["open"] == "(" { ')' } else { '}' };
        let fields = self.read_fields(&key, close);

        let mut entry = BibEntry {
            entry_type,
            key,
            fields,
        };
        self.known_keys.insert(key_lower.clone());

        // Resolve the crossref now if the parent is already known, or park
        // the entry until it is.
        if let Some(target) = entry.fields.get("crossref").map(|v| v.to_lowercase()) {
            match self.resolved.get(&target) {
                Some(parent) => crossref::supplement(&mut entry, parent),
                None => {
                    debug!(
                        slog_scope::logger(),
                        "Holding entry '{}' until '{}' appears", entry.key, target
                    );
                    if !self.pending.contains_key(&target) {
                        self.pending_order.push(target.clone());
                    }
                    self.pending.entry(target).or_default().push(entry);
                    return Scan::Deferred;
                }
            }
        }

        self.register(&key_lower, &entry);
        Scan::Entry(entry)
    }

    /// Record a yielded entry and mark its pending children releasable.
    fn register(&mut self, key_lower: &str, entry: &BibEntry) {
        if self.pending.contains_key(key_lower) {
            self.releasable.push_back(key_lower.to_string());
        }
        self.resolved.insert(key_lower.to_string(), entry.clone());
    }

    /// Release the next pending entry whose parent key has become
    /// releasable, FIFO per parent, parents in the order they were first
    /// marked. At end of stream parents that never appeared are marked too,
    /// so their children come back unsupplemented.
    fn release_pending(&mut self) -> Option<BibEntry> {
        while let Some(key) = self.releasable.front().cloned() {
            let child = match self.pending.get_mut(&key) {
                Some(queue) if !queue.is_empty() => Some(queue.remove(0)),
                _ => None,
            };

            let mut child = match child {
                Some(child) => child,
                None => {
                    // Slot drained; drop it, it's no longer needed.
                    self.pending.remove(&key);
                    self.releasable.pop_front();
                    continue;
                }
            };

            match self.resolved.get(&key) {
                Some(parent) => crossref::supplement(&mut child, parent),
                None => {
                    debug!(
                        slog_scope::logger(),
                        "No entry with key '{}' found; returning '{}' unsupplemented",
                        key,
                        child.key
                    );
                }
            }

            let child_key = child.key.to_lowercase();
            self.register(&child_key, &child);
            return Some(child);
        }

        None
    }
}

impl<R: BufRead> Iterator for BibIterator<R> {
    type Item = BibEntry;

    /// Yield the next fully-resolved entry, releasing waiting
    /// cross-referenced entries before reading further raw input.
    fn next(&mut self) -> Option<BibEntry> {
        loop {
            if let Some(entry) = self.release_pending() {
                return Some(entry);
            }

            if self.exhausted {
                return None;
            }

            match self.read_entry() {
                Scan::Entry(entry) => return Some(entry),
                Scan::Deferred | Scan::Skipped => continue,
                Scan::End => {
                    self.exhausted = true;
                    // Parents that never showed up: flush their children in
                    // the order the parents were first waited on.
                    for key in std::mem::take(&mut self.pending_order) {
                        self.releasable.push_back(key);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(src: &str) -> Vec<BibEntry> {
        BibIterator::new(Cursor::new(src), None).collect()
    }

    fn field<'a>(entry: &'a BibEntry, name: &str) -> Option<&'a str> {
        entry.fields.get(name).map(|v| v.as_str())
    }

    #[test]
    fn single_entry_round_trip() {
        let entries = parse(r#"@book{tolkien1937, author = {J. R. R. Tolkien}, year = "1937"}"#);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, "book");
        assert_eq!(entries[0].key, "tolkien1937");
        assert_eq!(field(&entries[0], "author"), Some("J. R. R. Tolkien"));
        assert_eq!(field(&entries[0], "year"), Some("1937"));
    }

    #[test]
    fn multiline_entry() {
        let entries = parse(
            r#"@book{knuth97,
  author    = {Donald Ervin Knuth},
  title     = {The Art of Computer Programming},
  publisher = {Addison-Wesley},
  year      = {1997}
}"#,
        );

        assert_eq!(entries.len(), 1);
        assert_eq!(field(&entries[0], "year"), Some("1997"));
        assert_eq!(field(&entries[0], "publisher"), Some("Addison-Wesley"));
    }

    #[test]
    fn paren_delimited_entry() {
        let entries = parse(r#"@book(b1, title = "Parens")"#);

        assert_eq!(entries.len(), 1);
        assert_eq!(field(&entries[0], "title"), Some("Parens"));
    }

    #[test]
    fn string_definition_and_use() {
        let entries = parse(
            r#"@string{jan = "January"}
@article{a1, month = jan, year = 2020}"#,
        );

        assert_eq!(entries.len(), 1);
        assert_eq!(field(&entries[0], "month"), Some("January"));
        assert_eq!(field(&entries[0], "year"), Some("2020"));
    }

    #[test]
    fn string_first_definition_wins() {
        let entries = parse(
            r#"@string{jan = "January"}
@string{jan = "Janvier"}
@article{a1, month = jan}"#,
        );

        assert_eq!(field(&entries[0], "month"), Some("January"));
    }

    #[test]
    fn concatenation_with_macro() {
        let entries = parse(
            r#"@string{year = "2020"}
@article{a1, note = "a" # year}"#,
        );

        assert_eq!(field(&entries[0], "note"), Some("a2020"));
    }

    #[test]
    fn unresolved_macro_drops_field() {
        let entries = parse("@article{a1, month = febr, year = 2020}");

        assert_eq!(entries.len(), 1);
        assert_eq!(field(&entries[0], "month"), None);
        assert_eq!(field(&entries[0], "year"), Some("2020"));
    }

    #[test]
    fn seeded_macros_resolve() {
        let seed = MacroTable::from([("jan".to_string(), "January".to_string())]);
        let entries: Vec<BibEntry> =
            BibIterator::new(Cursor::new("@article{a1, month = jan}"), Some(seed)).collect();

        assert_eq!(field(&entries[0], "month"), Some("January"));
    }

    #[test]
    fn comment_and_preamble_ignored() {
        let entries = parse(
            r#"@comment{nothing to see here,}
@preamble{ "\newcommand{\noop}[1]{}" }
@book{b1, title = {Real}}"#,
        );

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "b1");
    }

    #[test]
    fn malformed_header_skipped() {
        let entries = parse(
            r#"@book{no separator here
@book{b1, title = {Fine}}"#,
        );

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "b1");
    }

    #[test]
    fn duplicate_key_dropped() {
        let entries = parse(
            r#"@book{key1, title = {First}}
@book{key1, title = {Second}}"#,
        );

        assert_eq!(entries.len(), 1);
        assert_eq!(field(&entries[0], "title"), Some("First"));
    }

    #[test]
    fn duplicate_key_case_insensitive() {
        let entries = parse(
            r#"@book{Key1, title = {First}}
@book{KEY1, title = {Second}}"#,
        );

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "Key1");
    }

    #[test]
    fn duplicate_field_first_wins() {
        let entries = parse("@book{b1, title = {First}, title = {Second}}");

        assert_eq!(field(&entries[0], "title"), Some("First"));
    }

    #[test]
    fn backward_crossref_resolves_immediately() {
        let entries = parse(
            r#"@book{b1, title = "Root", author = "X"}
@inbook{c1, crossref = "b1", author = "Y"}"#,
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "b1");
        assert_eq!(field(&entries[0], "title"), Some("Root"));
        assert_eq!(entries[1].key, "c1");
        assert_eq!(field(&entries[1], "booktitle"), Some("Root"));
        assert_eq!(field(&entries[1], "author"), Some("Y"));
        // The child's own crossref field stays; the parent's key doesn't
        // leak in under any other name.
        assert_eq!(field(&entries[1], "crossref"), Some("b1"));
        assert_eq!(field(&entries[1], "title"), None);
    }

    #[test]
    fn forward_crossref_held_until_parent() {
        let entries = parse(
            r#"@inbook{c1, crossref = "b1", author = "Y"}
@book{b1, title = "Root", author = "X"}"#,
        );

        assert_eq!(entries.len(), 2);
        // The parent is yielded first; the child follows once released.
        assert_eq!(entries[0].key, "b1");
        assert_eq!(entries[1].key, "c1");
        assert_eq!(field(&entries[1], "booktitle"), Some("Root"));
        assert_eq!(field(&entries[1], "bookauthor"), Some("X"));
        assert_eq!(field(&entries[1], "author"), Some("Y"));
    }

    #[test]
    fn forward_crossref_fifo_per_parent() {
        let entries = parse(
            r#"@inbook{c1, crossref = "b1"}
@inbook{c2, crossref = "b1"}
@book{b1, title = "Root"}"#,
        );

        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["b1", "c1", "c2"]);
        assert_eq!(field(&entries[1], "booktitle"), Some("Root"));
        assert_eq!(field(&entries[2], "booktitle"), Some("Root"));
    }

    #[test]
    fn chained_release() {
        // c2 waits on c1, which itself waits on b1. Releasing c1 must
        // unblock c2 in the same pull sequence.
        let entries = parse(
            r#"@inbook{c2, crossref = "c1"}
@inbook{c1, crossref = "b1"}
@book{b1, title = "Root"}"#,
        );

        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["b1", "c1", "c2"]);
        assert_eq!(field(&entries[1], "booktitle"), Some("Root"));
        // c2 inherits through c1 (same-name copy for the inbook/inbook
        // pair, minus skip fields).
        assert_eq!(field(&entries[2], "booktitle"), Some("Root"));
    }

    #[test]
    fn orphan_crossref_yielded_unsupplemented() {
        let entries = parse(r#"@inbook{c1, crossref = "missing", author = "Y"}"#);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "c1");
        assert_eq!(field(&entries[0], "author"), Some("Y"));
        assert_eq!(field(&entries[0], "booktitle"), None);
    }

    #[test]
    fn entries_after_orphan_still_yielded() {
        let entries = parse(
            r#"@inbook{c1, crossref = "missing"}
@book{b1, title = "Root"}"#,
        );

        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["b1", "c1"]);
    }

    #[test]
    fn reserved_field_dropped() {
        let entries = parse("@book{b1, _itemkey = {sneaky}, title = {Fine}}");

        assert_eq!(field(&entries[0], "_itemkey"), None);
        assert_eq!(field(&entries[0], "title"), Some("Fine"));
    }

    #[test]
    fn junk_between_entries_ignored() {
        let entries = parse(
            "Some stray prose.\n@book{b1, title = {A}}\nmore prose\n@book{b2, title = {B}}",
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "b1");
        assert_eq!(entries[1].key, "b2");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("no entries at all").is_empty());
    }

    #[test]
    fn spec_worked_example() {
        let entries = parse(
            "@book{b1,title=\"Root\",author=\"X\"}\n@inbook{c1,crossref=\"b1\",author=\"Y\"}",
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_type, "book");
        assert_eq!(field(&entries[0], "title"), Some("Root"));
        assert_eq!(field(&entries[0], "author"), Some("X"));
        assert_eq!(entries[1].entry_type, "inbook");
        assert_eq!(field(&entries[1], "booktitle"), Some("Root"));
        assert_eq!(field(&entries[1], "author"), Some("Y"));
    }
}

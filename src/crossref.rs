//! This module contains the cross-reference field mapping. When an entry
//! names another entry in its `crossref` field, the parent's fields are
//! copied onto the child, with some fields renamed, fanned out, or skipped
//! depending on the parent/child type pair.

use crate::parser::BibEntry;
use lazy_static::lazy_static;
use slog::{debug, trace};
use std::collections::HashMap;

/// Fields never inherited through a crossref.
///
/// Based on the biblatex manual, Appendix B. `_itemkey` is reserved for
/// internal use.
pub const CROSSREF_SKIP_FIELDS: [&str; 16] = [
    "crossref",
    "xref",
    "entryset",
    "entrysubtype",
    "execute",
    "label",
    "options",
    "presort",
    "related",
    "relatedoptions",
    "relatedstring",
    "relatedtype",
    "shorthand",
    "shorthandintro",
    "sortkey",
    "_itemkey",
];

/// How one parent field maps onto the child.
///
/// Fields without a rule are copied under the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Never inherited for this type pair.
    Skip,
    /// Copied under a different name.
    Rename(&'static str),
    /// Copied into several destination fields.
    FanOut(&'static [&'static str]),
}

type FieldRules = HashMap<&'static str, FieldRule>;

lazy_static! {
    /// Parent type → child type → per-field rules.
    ///
    /// The multivolume family (`mvbook` etc.) maps titles to `maintitle`,
    /// single works map them to `booktitle`, and periodicals map them to
    /// `journaltitle`. Aliased families (`mvreference`, `reference`,
    /// `suppperiodical`) are expanded here once rather than looked up
    /// indirectly at run time.
    static ref CROSSREF_MAP: HashMap<&'static str, HashMap<&'static str, FieldRules>> = {
        let mv_rules: FieldRules = HashMap::from([
            ("title", FieldRule::Rename("maintitle")),
            ("subtitle", FieldRule::Rename("mainsubtitle")),
            ("titleaddon", FieldRule::Rename("titleaddon")),
            ("shorttitle", FieldRule::Skip),
            ("sorttitle", FieldRule::Skip),
            ("indextitle", FieldRule::Skip),
            ("indexsorttitle", FieldRule::Skip),
            ("author", FieldRule::FanOut(&["author", "bookauthor"])),
        ]);

        let book_rules: FieldRules = HashMap::from([
            ("title", FieldRule::Rename("booktitle")),
            ("subtitle", FieldRule::Rename("booksubtitle")),
            ("titleaddon", FieldRule::Rename("booktitleaddon")),
            ("shorttitle", FieldRule::Skip),
            ("sorttitle", FieldRule::Skip),
            ("indextitle", FieldRule::Skip),
            ("indexsorttitle", FieldRule::Skip),
            ("author", FieldRule::FanOut(&["author", "bookauthor"])),
        ]);

        let periodical_rules: FieldRules = HashMap::from([
            ("title", FieldRule::Rename("journaltitle")),
            ("subtitle", FieldRule::Rename("journalsubtitle")),
            ("shorttitle", FieldRule::Skip),
            ("sorttitle", FieldRule::Skip),
            ("indextitle", FieldRule::Skip),
            ("indexsorttitle", FieldRule::Skip),
        ]);

        let mut map: HashMap<&'static str, HashMap<&'static str, FieldRules>> = HashMap::new();
        let mut family =
            |parents: &[&'static str], children: &[&'static str], rules: &FieldRules| {
                for parent in parents {
                    let children_map = map.entry(*parent).or_default();
                    for child in children {
                        children_map.insert(*child, rules.clone());
                    }
                }
            };

        family(
            &["mvbook"],
            &["book", "inbook", "bookinbook", "suppbook"],
            &mv_rules,
        );
        family(
            &["mvcollection", "mvreference"],
            &[
                "collection",
                "reference",
                "incollection",
                "inreference",
                "suppcollection",
            ],
            &mv_rules,
        );
        family(
            &["mvproceedings"],
            &["proceedings", "inproceedings"],
            &mv_rules,
        );
        family(
            &["book"],
            &["inbook", "bookinbook", "suppbook"],
            &book_rules,
        );
        family(
            &["collection", "reference"],
            &["incollection", "inreference", "suppcollection"],
            &book_rules,
        );
        family(&["proceedings"], &["inproceedings"], &book_rules);
        family(
            &["periodical"],
            &["article", "suppperiodical"],
            &periodical_rules,
        );

        map
    };
}

/// Supplement a child entry with the fields of its crossref parent.
///
/// Applied field-by-field: skip fields are never copied, the type-pair
/// rules rename or drop what they name, everything else copies under the
/// same name. A field the child already has is never overwritten.
pub fn supplement(child: &mut BibEntry, parent: &BibEntry) {
    debug!(
        slog_scope::logger(),
        "Supplementing entry '{}' with fields from entry '{}'", child.key, parent.key
    );

    let rules = CROSSREF_MAP
        .get(parent.entry_type.as_str())
        .and_then(|children| children.get(child.entry_type.as_str()));

    for (field, value) in &parent.fields {
        if CROSSREF_SKIP_FIELDS.contains(&field.as_str()) {
            continue;
        }

        let destinations: Vec<&str> = match rules.and_then(|r| r.get(field.as_str())) {
            Some(FieldRule::Skip) => continue,
            Some(FieldRule::Rename(dest)) => vec![dest],
            Some(FieldRule::FanOut(dests)) => dests.to_vec(),
            None => vec![field.as_str()],
        };

        for dest in destinations {
            if child.fields.contains_key(dest) {
                continue;
            }

            trace!(
                slog_scope::logger(),
                "Adding field '{}' from field '{}'",
                dest,
                field
            );
            child.fields.insert(dest.to_string(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn entry(entry_type: &str, key: &str, fields: &[(&str, &str)]) -> BibEntry {
        BibEntry {
            entry_type: entry_type.to_string(),
            key: key.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<String, String>>(),
        }
    }

    #[test]
    fn book_title_becomes_booktitle() {
        let parent = entry("book", "b1", &[("title", "Root"), ("year", "1997")]);
        let mut child = entry("inbook", "c1", &[("crossref", "b1")]);
        supplement(&mut child, &parent);

        assert_eq!(child.fields.get("booktitle"), Some(&"Root".to_string()));
        assert_eq!(child.fields.get("title"), None);
        assert_eq!(child.fields.get("year"), Some(&"1997".to_string()));
    }

    #[test]
    fn mvbook_title_becomes_maintitle() {
        let parent = entry("mvbook", "m1", &[("title", "Collected Works")]);
        let mut child = entry("book", "c1", &[("crossref", "m1")]);
        supplement(&mut child, &parent);

        assert_eq!(
            child.fields.get("maintitle"),
            Some(&"Collected Works".to_string())
        );
    }

    #[test]
    fn periodical_title_becomes_journaltitle() {
        let parent = entry("periodical", "p1", &[("title", "Annals")]);
        let mut child = entry("article", "a1", &[("crossref", "p1")]);
        supplement(&mut child, &parent);

        assert_eq!(
            child.fields.get("journaltitle"),
            Some(&"Annals".to_string())
        );
    }

    #[test]
    fn author_fans_out_to_bookauthor() {
        let parent = entry("book", "b1", &[("author", "Knuth")]);
        let mut child = entry("inbook", "c1", &[]);
        supplement(&mut child, &parent);

        assert_eq!(child.fields.get("author"), Some(&"Knuth".to_string()));
        assert_eq!(child.fields.get("bookauthor"), Some(&"Knuth".to_string()));
    }

    #[test]
    fn skip_rules_drop_sort_titles() {
        let parent = entry(
            "book",
            "b1",
            &[("shorttitle", "S"), ("sorttitle", "S"), ("indextitle", "S")],
        );
        let mut child = entry("inbook", "c1", &[]);
        supplement(&mut child, &parent);

        assert!(child.fields.is_empty());
    }

    #[test]
    fn skip_fields_never_copied() {
        let parent = entry("book", "b1", &[("crossref", "b0"), ("label", "L")]);
        let mut child = entry("inbook", "c1", &[]);
        supplement(&mut child, &parent);

        assert!(child.fields.is_empty());
    }

    #[test]
    fn unmapped_type_pair_copies_same_name() {
        let parent = entry("article", "a1", &[("journal", "Annals"), ("year", "2001")]);
        let mut child = entry("misc", "m1", &[]);
        supplement(&mut child, &parent);

        assert_eq!(child.fields.get("journal"), Some(&"Annals".to_string()));
        assert_eq!(child.fields.get("year"), Some(&"2001".to_string()));
    }

    #[test]
    fn child_field_wins() {
        let parent = entry("book", "b1", &[("title", "Root"), ("author", "X")]);
        let mut child = entry("inbook", "c1", &[("booktitle", "Mine"), ("author", "Y")]);
        supplement(&mut child, &parent);

        assert_eq!(child.fields.get("booktitle"), Some(&"Mine".to_string()));
        assert_eq!(child.fields.get("author"), Some(&"Y".to_string()));
        // The fan-out's second destination is still filled in.
        assert_eq!(child.fields.get("bookauthor"), Some(&"X".to_string()));
    }
}

//! Formatted output helpers for CLI commands.
//!
//! Every helper returns the text instead of printing it, so commands
//! decide where it goes.

use std::fmt::{Display, Write};

use strata_common::constants::APP_NAME;
use strata_common::types::{ArtifactRef, Role};

const RULE: char = '\u{2550}';

/// A title line underlined to its own width.
#[must_use]
pub fn banner(title: &str) -> String {
    let title = format!("{APP_NAME} | {title}");
    let rule: String = std::iter::repeat_n(RULE, title.chars().count()).collect();
    format!("{title}\n{rule}\n\n")
}

/// A titled, 1-based numbered list.
#[must_use]
pub fn format_numbered<T: Display>(title: &str, items: &[T]) -> String {
    let mut out = format!("  {title}:\n");
    if items.is_empty() {
        out.push_str("    (none)\n");
    }
    let width = items.len().to_string().len();
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "    {:>width$}. {item}", i + 1);
    }
    out
}

/// One classpath: a header line, then its entries in order. Unit outputs
/// are marked `[unit]`, external artifacts `[ext]`.
#[must_use]
pub fn format_classpath(unit: &str, role: Role, entries: &[ArtifactRef]) -> String {
    let noun = if entries.len() == 1 { "entry" } else { "entries" };
    let mut out = format!("{unit} ({role}): {} {noun}\n", entries.len());
    for entry in entries {
        let tag = match entry {
            ArtifactRef::Output(_) => "unit",
            ArtifactRef::External(_) => "ext",
        };
        let _ = writeln!(out, "  [{tag:<4}] {entry}");
    }
    out
}

#[cfg(test)]
mod tests {
    use strata_common::types::{ProjectPath, UnitId};

    use super::*;

    #[test]
    fn banner_rule_matches_title_width() {
        let text = banner("plan");
        let mut lines = text.lines();
        let title = lines.next().expect("title");
        let rule = lines.next().expect("rule");
        assert_eq!(title, "strata | plan");
        assert_eq!(rule.chars().count(), title.chars().count());
    }

    #[test]
    fn format_numbered_pads_indices() {
        let items: Vec<usize> = (0..10).collect();
        let text = format_numbered("Items", &items);
        assert!(text.starts_with("  Items:\n"));
        assert!(text.contains("     1. 0\n"));
        assert!(text.contains("    10. 9\n"));
    }

    #[test]
    fn format_numbered_marks_empty_lists() {
        assert_eq!(format_numbered::<String>("Scopes", &[]), "  Scopes:\n    (none)\n");
    }

    #[test]
    fn format_classpath_tags_entries() {
        let entries = vec![
            ArtifactRef::Output(UnitId::new(ProjectPath::root(), "launch")),
            ArtifactRef::External("org.ow2.asm:asm:9.2".into()),
        ];
        let text = format_classpath(":/main", Role::Compile, &entries);
        assert_eq!(
            text,
            ":/main (compile): 2 entries\n  [unit] :/launch\n  [ext ] org.ow2.asm:asm:9.2\n"
        );
    }
}

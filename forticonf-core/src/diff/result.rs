use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// A single diff outcome for a configuration path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum DiffEntry {
    /// Block or entry exists in both with identical content.
    Identical { path: String },
    /// Setting exists in both but values differ.
    Modified {
        path: String,
        left: String,
        right: String,
    },
    /// Block, entry or setting only in the left input.
    OnlyLeft { path: String, value: String },
    /// Block, entry or setting only in the right input.
    OnlyRight { path: String, value: String },
    /// Structural mismatch (for example, entries reordered).
    Structural { path: String, description: String },
}

impl DiffEntry {
    pub fn path(&self) -> &str {
        match self {
            DiffEntry::Identical { path }
            | DiffEntry::Modified { path, .. }
            | DiffEntry::OnlyLeft { path, .. }
            | DiffEntry::OnlyRight { path, .. }
            | DiffEntry::Structural { path, .. } => path,
        }
    }

    /// Top-level `config` section the path starts in, e.g. `firewall address`
    /// for `firewall address[web].subnet`.
    pub fn section(&self) -> &str {
        let path = self.path();
        path.find(['[', '.']).map_or(path, |end| &path[..end])
    }

    /// The path below [`section`](Self::section), empty for whole sections.
    pub fn subpath(&self) -> &str {
        let rest = &self.path()[self.section().len()..];
        rest.strip_prefix('.').unwrap_or(rest)
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, DiffEntry::Identical { .. })
    }
}

/// Per-kind entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub modified: usize,
    pub only_left: usize,
    pub only_right: usize,
    pub structural: usize,
    pub identical: usize,
}

impl DiffSummary {
    pub fn of(entries: &[DiffEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut acc, entry| {
            match entry {
                DiffEntry::Identical { .. } => acc.identical += 1,
                DiffEntry::Modified { .. } => acc.modified += 1,
                DiffEntry::OnlyLeft { .. } => acc.only_left += 1,
                DiffEntry::OnlyRight { .. } => acc.only_right += 1,
                DiffEntry::Structural { .. } => acc.structural += 1,
            }
            acc
        })
    }

    pub fn changes(&self) -> usize {
        self.modified + self.only_left + self.only_right + self.structural
    }
}

impl Display for DiffSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "changes={} modified={} only_left={} only_right={} structural={}",
            self.changes(),
            self.modified,
            self.only_left,
            self.only_right,
            self.structural
        )?;
        if self.identical > 0 {
            write!(f, " identical={}", self.identical)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DiffEntry, DiffSummary};

    #[test]
    fn section_splits_at_first_entry_or_setting() {
        let setting = DiffEntry::Modified {
            path: "firewall policy[1].action".to_string(),
            left: "accept".to_string(),
            right: "deny".to_string(),
        };
        assert_eq!(setting.section(), "firewall policy");
        assert_eq!(setting.subpath(), "[1].action");

        let global = DiffEntry::OnlyRight {
            path: "system global.timezone".to_string(),
            value: "04".to_string(),
        };
        assert_eq!(global.section(), "system global");
        assert_eq!(global.subpath(), "timezone");

        let whole = DiffEntry::Structural {
            path: "firewall policy".to_string(),
            description: "entry order changed".to_string(),
        };
        assert_eq!(whole.section(), "firewall policy");
        assert_eq!(whole.subpath(), "");
    }

    #[test]
    fn entries_serialize_with_a_type_tag() {
        let entry = DiffEntry::Modified {
            path: "system global.hostname".to_string(),
            left: "a".to_string(),
            right: "b".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&entry).expect("json"),
            serde_json::json!({
                "type": "Modified",
                "path": "system global.hostname",
                "left": "a",
                "right": "b",
            })
        );
    }

    #[test]
    fn summary_hides_identical_count_when_zero() {
        let entries = [
            DiffEntry::OnlyLeft {
                path: "firewall address[old]".to_string(),
                value: String::new(),
            },
            DiffEntry::Structural {
                path: "firewall policy".to_string(),
                description: String::new(),
            },
        ];
        let summary = DiffSummary::of(&entries);
        assert_eq!(summary.changes(), 2);
        assert_eq!(
            summary.to_string(),
            "changes=2 modified=0 only_left=1 only_right=0 structural=1"
        );

        let same = DiffSummary::of(&[DiffEntry::Identical {
            path: "system global".to_string(),
        }]);
        assert_eq!(
            same.to_string(),
            "changes=0 modified=0 only_left=0 only_right=0 structural=0 identical=1"
        );
    }
}

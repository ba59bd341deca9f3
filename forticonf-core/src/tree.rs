use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// How a setting line affected its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOp {
    /// `set`, `append` and `select` lines. Values accumulate in declaration order.
    Set,
    /// `unset` line. The key is explicitly reset to its default.
    Unset,
}

/// A single `set <key> <values...>` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub key: String,
    /// Value tokens in declaration order, quotes removed.
    pub values: Vec<String>,
    pub op: SetOp,
    /// 1-based line number of the last line that touched this key.
    pub line: usize,
}

impl Setting {
    /// Return the first value token, if any.
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// Return all value tokens joined with a single space.
    pub fn joined(&self) -> String {
        self.values.join(" ")
    }
}

impl Display for Setting {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.op {
            SetOp::Unset => write!(f, "unset {}", self.key),
            SetOp::Set => write!(f, "set {} {}", self.key, self.joined()),
        }
    }
}

/// One `edit <name> ... next` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigEntry {
    pub name: String,
    pub line: usize,
    pub settings: Vec<Setting>,
    /// Nested `config` blocks inside the entry (for example `config vdom` > `edit root`).
    pub blocks: Vec<ConfigBlock>,
}

/// One `config <section> ... end` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigBlock {
    /// Section path words joined by a single space, e.g. `firewall address`.
    pub section: String,
    pub line: usize,
    /// Settings set directly on the block (singleton sections such as `system global`).
    pub settings: Vec<Setting>,
    pub entries: Vec<ConfigEntry>,
    pub blocks: Vec<ConfigBlock>,
}

/// A line whose leading keyword is not part of the block grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveNote {
    pub line: usize,
    pub directive: String,
    pub text: String,
}

/// A parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigTree {
    /// The `#config-version=...` header line, when present.
    pub header: Option<String>,
    pub blocks: Vec<ConfigBlock>,
    pub notes: Vec<DirectiveNote>,
}

impl ConfigTree {
    /// Return the first top-level block with the provided section path.
    pub fn block(&self, section: &str) -> Option<&ConfigBlock> {
        self.blocks.iter().find(|b| b.section == section)
    }

    /// Parse the FortiOS version out of the header (`#config-version=FGT60F-7.2.5-FW-build1517-...`).
    pub fn fortios_version(&self) -> Option<String> {
        let header = self.header.as_deref()?;
        let (_, rest) = header.split_once('=')?;
        let mut parts = rest.split('-');
        let _model = parts.next()?;
        let version = parts.next()?;
        version
            .chars()
            .next()
            .filter(char::is_ascii_digit)
            .map(|_| version.to_string())
    }
}

impl ConfigBlock {
    pub fn new(section: impl Into<String>, line: usize) -> Self {
        Self {
            section: section.into(),
            line,
            settings: Vec::new(),
            entries: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Return the entry with the provided edit name.
    pub fn entry(&self, name: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Return the first nested block with the provided section path.
    pub fn block(&self, section: &str) -> Option<&ConfigBlock> {
        self.blocks.iter().find(|b| b.section == section)
    }

    pub fn setting(&self, key: &str) -> Option<&Setting> {
        find_setting(&self.settings, key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.setting(key).and_then(Setting::value)
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.setting(key).map_or(&[], |s| s.values.as_slice())
    }
}

impl ConfigEntry {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            settings: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Return the first nested block with the provided section path.
    pub fn block(&self, section: &str) -> Option<&ConfigBlock> {
        self.blocks.iter().find(|b| b.section == section)
    }

    pub fn setting(&self, key: &str) -> Option<&Setting> {
        find_setting(&self.settings, key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.setting(key).and_then(Setting::value)
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.setting(key).map_or(&[], |s| s.values.as_slice())
    }
}

fn find_setting<'a>(settings: &'a [Setting], key: &str) -> Option<&'a Setting> {
    settings
        .iter()
        .find(|s| s.key == key && s.op == SetOp::Set)
}

#[cfg(test)]
mod tests {
    use super::{ConfigBlock, ConfigEntry, ConfigTree, SetOp, Setting};

    fn setting(key: &str, values: &[&str]) -> Setting {
        Setting {
            key: key.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            op: SetOp::Set,
            line: 1,
        }
    }

    #[test]
    fn entry_lookups_skip_unset_keys() {
        let mut entry = ConfigEntry::new("web", 2);
        entry.settings.push(setting("member", &["a", "b"]));
        entry.settings.push(Setting {
            key: "comment".to_string(),
            values: Vec::new(),
            op: SetOp::Unset,
            line: 4,
        });

        assert_eq!(entry.values("member"), ["a", "b"]);
        assert_eq!(entry.value("comment"), None);
        assert!(entry.values("missing").is_empty());
    }

    #[test]
    fn block_finds_entries_by_name() {
        let mut block = ConfigBlock::new("firewall address", 1);
        block.entries.push(ConfigEntry::new("a", 2));
        block.entries.push(ConfigEntry::new("b", 5));
        assert_eq!(block.entry("b").map(|e| e.line), Some(5));
    }

    #[test]
    fn version_comes_from_header() {
        let tree = ConfigTree {
            header: Some(
                "#config-version=FGT60F-7.2.5-FW-build1517-230606:opmode=0:vdom=0:user=admin"
                    .to_string(),
            ),
            ..ConfigTree::default()
        };
        assert_eq!(tree.fortios_version().as_deref(), Some("7.2.5"));
    }
}

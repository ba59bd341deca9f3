use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::tree::{ConfigBlock, ConfigEntry, ConfigTree, SetOp, Setting};

const INDENT: &str = "    ";

/// Errors that can occur while writing a [`ConfigTree`].
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to write output file.
    #[error("failed to write config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize a [`ConfigTree`] into canonical FortiOS CLI text.
pub fn write(tree: &ConfigTree) -> String {
    let mut out = String::new();
    if let Some(header) = &tree.header {
        out.push_str(header);
        out.push('\n');
    }
    for block in &tree.blocks {
        write_block_at(&mut out, block, 0);
    }
    out
}

/// Serialize a single block (and everything nested in it).
pub fn write_block(block: &ConfigBlock) -> String {
    let mut out = String::new();
    write_block_at(&mut out, block, 0);
    out
}

/// Serialize a [`ConfigTree`] and write it to `path`.
pub fn write_file(tree: &ConfigTree, path: &Path) -> Result<(), WriteError> {
    fs::write(path, write(tree))?;
    Ok(())
}

pub(crate) fn write_entry(entry: &ConfigEntry) -> String {
    let mut out = String::new();
    write_entry_at(&mut out, entry, 0);
    out
}

fn write_block_at(out: &mut String, block: &ConfigBlock, depth: usize) {
    let indent = INDENT.repeat(depth);
    let _ = writeln!(out, "{indent}config {}", block.section);
    for setting in &block.settings {
        write_setting_at(out, setting, depth + 1);
    }
    for entry in &block.entries {
        write_entry_at(out, entry, depth + 1);
    }
    for child in &block.blocks {
        write_block_at(out, child, depth + 1);
    }
    let _ = writeln!(out, "{indent}end");
}

fn write_entry_at(out: &mut String, entry: &ConfigEntry, depth: usize) {
    let indent = INDENT.repeat(depth);
    let name = if !entry.name.is_empty() && entry.name.chars().all(|c| c.is_ascii_digit()) {
        entry.name.clone()
    } else {
        quote(&entry.name)
    };
    let _ = writeln!(out, "{indent}edit {name}");
    for setting in &entry.settings {
        write_setting_at(out, setting, depth + 1);
    }
    for child in &entry.blocks {
        write_block_at(out, child, depth + 1);
    }
    let _ = writeln!(out, "{indent}next");
}

fn write_setting_at(out: &mut String, setting: &Setting, depth: usize) {
    let indent = INDENT.repeat(depth);
    match setting.op {
        SetOp::Unset => {
            let _ = writeln!(out, "{indent}unset {}", setting.key);
        }
        SetOp::Set => {
            let values = setting
                .values
                .iter()
                .map(|v| quote_if_needed(v))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(out, "{indent}set {} {values}", setting.key);
        }
    }
}

fn quote_if_needed(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.starts_with('#')
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if needs_quotes {
        quote(value)
    } else {
        value.to_string()
    }
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::write;
    use crate::parser::parse;

    #[test]
    fn writes_canonical_indentation_and_quotes() {
        let tree = parse(
            "config firewall address\nedit web\nset subnet 10.0.0.1 255.255.255.255\nset comment \"front end\"\nnext\nend\nconfig firewall policy\nedit 7\nunset comments\nnext\nend\n",
        )
        .expect("parse");

        assert_eq!(
            write(&tree),
            "config firewall address\n    edit \"web\"\n        set subnet 10.0.0.1 255.255.255.255\n        set comment \"front end\"\n    next\nend\nconfig firewall policy\n    edit 7\n        unset comments\n    next\nend\n"
        );
    }

    #[test]
    fn escapes_embedded_quotes() {
        let tree = parse("config a\nset comment \"say \\\"hi\\\"\"\nend\n").expect("parse");
        assert!(write(&tree).contains(r#"set comment "say \"hi\"""#));
    }
}

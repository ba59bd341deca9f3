use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::lexer::lex;
use crate::tree::{ConfigBlock, ConfigEntry, ConfigTree, DirectiveNote, SetOp, Setting};

/// Structural problems that abort a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    #[error("`end` without an open `config` block")]
    UnmatchedEnd,
    #[error("`next` without an open `edit` entry")]
    UnexpectedNext,
    #[error("`edit` outside of a `config` block")]
    EditOutsideConfig,
    #[error("setting outside of a `config` block")]
    SettingOutsideBlock,
    #[error("`config` without a section name")]
    MissingSectionName,
    #[error("`edit` without an entry name")]
    MissingEditName,
    #[error("setting without a key")]
    MissingSettingKey,
    #[error("`end` reached while an `edit` entry is still open")]
    EntryNotClosed,
    #[error("block is never closed")]
    UnclosedBlock,
    #[error("unterminated quoted string")]
    UnterminatedQuote,
}

/// Errors that can occur while parsing configuration text into a [`ConfigTree`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed block structure. Nothing parsed before it is trustworthy.
    #[error("line {line}: {kind} (near `{token}`)")]
    Syntax {
        line: usize,
        token: String,
        kind: SyntaxErrorKind,
    },
    /// Failed to read input file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Line of the offending token, for syntax errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Syntax { line, .. } => Some(*line),
            ParseError::Io(_) => None,
        }
    }
}

enum Frame {
    Block(ConfigBlock),
    Entry(ConfigEntry),
}

impl Frame {
    fn line(&self) -> usize {
        match self {
            Frame::Block(b) => b.line,
            Frame::Entry(e) => e.line,
        }
    }

    fn label(&self) -> String {
        match self {
            Frame::Block(b) => format!("config {}", b.section),
            Frame::Entry(e) => format!("edit {}", e.name),
        }
    }

    fn settings_mut(&mut self) -> &mut Vec<Setting> {
        match self {
            Frame::Block(b) => &mut b.settings,
            Frame::Entry(e) => &mut e.settings,
        }
    }
}

/// Parse configuration text into a [`ConfigTree`].
pub fn parse(text: &str) -> Result<ConfigTree, ParseError> {
    let mut tree = ConfigTree {
        header: text
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with("#config-version"))
            .map(ToOwned::to_owned),
        ..ConfigTree::default()
    };
    let mut stack: Vec<Frame> = Vec::new();

    for stmt in lex(text)? {
        let Some((keyword, args)) = stmt.tokens.split_first() else {
            continue;
        };
        let line = stmt.line;

        match keyword.as_str() {
            "config" => {
                if args.is_empty() {
                    return Err(syntax(line, keyword, SyntaxErrorKind::MissingSectionName));
                }
                stack.push(Frame::Block(ConfigBlock::new(args.join(" "), line)));
            }
            "edit" => {
                if !matches!(stack.last(), Some(Frame::Block(_))) {
                    return Err(syntax(line, keyword, SyntaxErrorKind::EditOutsideConfig));
                }
                let name = args
                    .first()
                    .ok_or_else(|| syntax(line, keyword, SyntaxErrorKind::MissingEditName))?;
                stack.push(Frame::Entry(ConfigEntry::new(name.clone(), line)));
            }
            "next" => match stack.pop() {
                Some(Frame::Entry(entry)) => {
                    if let Some(Frame::Block(parent)) = stack.last_mut() {
                        parent.entries.push(entry);
                    }
                }
                _ => return Err(syntax(line, keyword, SyntaxErrorKind::UnexpectedNext)),
            },
            "end" => match stack.pop() {
                Some(Frame::Block(block)) => attach_block(&mut stack, &mut tree, block),
                Some(Frame::Entry(entry)) => {
                    return Err(syntax(
                        line,
                        &format!("edit {}", entry.name),
                        SyntaxErrorKind::EntryNotClosed,
                    ))
                }
                None => return Err(syntax(line, keyword, SyntaxErrorKind::UnmatchedEnd)),
            },
            "set" | "unset" | "append" | "select" | "unselect" => {
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| syntax(line, keyword, SyntaxErrorKind::SettingOutsideBlock))?;
                let (key, values) = args
                    .split_first()
                    .ok_or_else(|| syntax(line, keyword, SyntaxErrorKind::MissingSettingKey))?;
                apply_setting(frame.settings_mut(), keyword, key, values, line);
            }
            _ => tree.notes.push(DirectiveNote {
                line,
                directive: keyword.clone(),
                text: stmt.tokens.join(" "),
            }),
        }
    }

    if let Some(open) = stack.last() {
        return Err(syntax(
            open.line(),
            &open.label(),
            SyntaxErrorKind::UnclosedBlock,
        ));
    }

    Ok(tree)
}

/// Parse a configuration file into a [`ConfigTree`].
pub fn parse_file(path: &Path) -> Result<ConfigTree, ParseError> {
    let text = fs::read_to_string(path)?;
    parse(&text)
}

fn syntax(line: usize, token: &str, kind: SyntaxErrorKind) -> ParseError {
    ParseError::Syntax {
        line,
        token: token.to_string(),
        kind,
    }
}

fn attach_block(stack: &mut [Frame], tree: &mut ConfigTree, block: ConfigBlock) {
    match stack.last_mut() {
        Some(Frame::Block(parent)) => parent.blocks.push(block),
        Some(Frame::Entry(parent)) => parent.blocks.push(block),
        None => tree.blocks.push(block),
    }
}

fn apply_setting(
    settings: &mut Vec<Setting>,
    directive: &str,
    key: &str,
    values: &[String],
    line: usize,
) {
    let existing = settings.iter().position(|s| s.key == key);
    match (directive, existing) {
        ("set", Some(idx)) => {
            let setting = &mut settings[idx];
            setting.values = values.to_vec();
            setting.op = SetOp::Set;
            setting.line = line;
        }
        ("unset", Some(idx)) => {
            let setting = &mut settings[idx];
            setting.values.clear();
            setting.op = SetOp::Unset;
            setting.line = line;
        }
        ("append" | "select", Some(idx)) => {
            let setting = &mut settings[idx];
            if setting.op == SetOp::Unset {
                setting.values.clear();
                setting.op = SetOp::Set;
            }
            for value in values {
                if !setting.values.contains(value) {
                    setting.values.push(value.clone());
                }
            }
            setting.line = line;
        }
        ("unselect", Some(idx)) => {
            let setting = &mut settings[idx];
            setting.values.retain(|v| !values.contains(v));
            setting.line = line;
        }
        ("unselect", None) => {}
        (_, None) => settings.push(Setting {
            key: key.to_string(),
            values: if directive == "unset" {
                Vec::new()
            } else {
                values.to_vec()
            },
            op: if directive == "unset" {
                SetOp::Unset
            } else {
                SetOp::Set
            },
            line,
        }),
        _ => {}
    }
}

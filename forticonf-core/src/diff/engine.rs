use std::collections::HashSet;

use crate::diff::result::DiffEntry;
use crate::tree::{ConfigBlock, ConfigEntry, ConfigTree, SetOp, Setting};
use crate::writer::{write_block, write_entry};

/// Configures tree diff behavior.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Include [`DiffEntry::Identical`] rows.
    pub include_identical: bool,
    /// Maximum block nesting depth. `-1` means unlimited.
    pub max_depth: i32,
    /// Paths, section names or setting keys to ignore.
    pub ignore_paths: Vec<String>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            include_identical: false,
            max_depth: -1,
            ignore_paths: Vec::new(),
        }
    }
}

/// Diff two configuration trees with default options.
pub fn diff(left: &ConfigTree, right: &ConfigTree) -> Vec<DiffEntry> {
    diff_with_options(left, right, &DiffOptions::default())
}

/// Diff two configuration trees with custom options.
pub fn diff_with_options(
    left: &ConfigTree,
    right: &ConfigTree,
    opts: &DiffOptions,
) -> Vec<DiffEntry> {
    let mut out = Vec::new();
    let mut ctx = MatchContext {
        parent_path: "",
        depth: 0,
        opts,
        out: &mut out,
    };
    diff_blocks(&left.blocks, &right.blocks, &mut ctx);
    out
}

struct MatchContext<'a, 'b> {
    parent_path: &'a str,
    depth: i32,
    opts: &'a DiffOptions,
    out: &'b mut Vec<DiffEntry>,
}

fn diff_blocks(left: &[ConfigBlock], right: &[ConfigBlock], ctx: &mut MatchContext<'_, '_>) {
    let mut sections: Vec<&str> = Vec::new();
    for block in left.iter().chain(right) {
        if !sections.contains(&block.section.as_str()) {
            sections.push(&block.section);
        }
    }

    for section in sections {
        let left_nodes: Vec<&ConfigBlock> = left.iter().filter(|b| b.section == section).collect();
        let right_nodes: Vec<&ConfigBlock> =
            right.iter().filter(|b| b.section == section).collect();
        let max = left_nodes.len().max(right_nodes.len());
        for i in 0..max {
            let mut path = join_path(ctx.parent_path, section);
            if max > 1 {
                path.push_str(&format!("[#{}]", i + 1));
            }
            if should_ignore(&path, ctx.opts) {
                continue;
            }
            match (left_nodes.get(i), right_nodes.get(i)) {
                (Some(l), Some(r)) => diff_block(l, r, &path, ctx.depth, ctx.opts, ctx.out),
                (Some(l), None) => ctx.out.push(DiffEntry::OnlyLeft {
                    path,
                    value: write_block(l),
                }),
                (None, Some(r)) => ctx.out.push(DiffEntry::OnlyRight {
                    path,
                    value: write_block(r),
                }),
                (None, None) => {}
            }
        }
    }
}

fn diff_block(
    left: &ConfigBlock,
    right: &ConfigBlock,
    path: &str,
    depth: i32,
    opts: &DiffOptions,
    out: &mut Vec<DiffEntry>,
) {
    if opts.max_depth >= 0 && depth > opts.max_depth {
        return;
    }

    let start_len = out.len();
    diff_settings(&left.settings, &right.settings, path, opts, out);
    diff_entries(&left.entries, &right.entries, path, depth, opts, out);
    let mut ctx = MatchContext {
        parent_path: path,
        depth: depth + 1,
        opts,
        out: &mut *out,
    };
    diff_blocks(&left.blocks, &right.blocks, &mut ctx);

    if opts.include_identical && out.len() == start_len {
        out.push(DiffEntry::Identical {
            path: path.to_string(),
        });
    }
}

fn diff_entry(
    left: &ConfigEntry,
    right: &ConfigEntry,
    path: &str,
    depth: i32,
    opts: &DiffOptions,
    out: &mut Vec<DiffEntry>,
) {
    let start_len = out.len();
    diff_settings(&left.settings, &right.settings, path, opts, out);
    let mut ctx = MatchContext {
        parent_path: path,
        depth: depth + 1,
        opts,
        out: &mut *out,
    };
    diff_blocks(&left.blocks, &right.blocks, &mut ctx);

    if opts.include_identical && out.len() == start_len {
        out.push(DiffEntry::Identical {
            path: path.to_string(),
        });
    }
}

fn diff_entries(
    left: &[ConfigEntry],
    right: &[ConfigEntry],
    path: &str,
    depth: i32,
    opts: &DiffOptions,
    out: &mut Vec<DiffEntry>,
) {
    let mut used_right = HashSet::new();

    for left_entry in left {
        let child_path = format!("{path}[{}]", left_entry.name);
        if should_ignore(&child_path, opts) {
            continue;
        }
        let matched = right
            .iter()
            .enumerate()
            .find(|(idx, r)| !used_right.contains(idx) && r.name == left_entry.name)
            .map(|(idx, _)| idx);

        match matched {
            Some(idx) => {
                used_right.insert(idx);
                diff_entry(left_entry, &right[idx], &child_path, depth, opts, out);
            }
            None => out.push(DiffEntry::OnlyLeft {
                path: child_path,
                value: write_entry(left_entry),
            }),
        }
    }

    for (idx, right_entry) in right.iter().enumerate() {
        if used_right.contains(&idx) {
            continue;
        }
        let child_path = format!("{path}[{}]", right_entry.name);
        if should_ignore(&child_path, opts) {
            continue;
        }
        out.push(DiffEntry::OnlyRight {
            path: child_path,
            value: write_entry(right_entry),
        });
    }

    let right_names: HashSet<&str> = right.iter().map(|e| e.name.as_str()).collect();
    let left_names: HashSet<&str> = left.iter().map(|e| e.name.as_str()).collect();
    let left_order: Vec<&str> = left
        .iter()
        .map(|e| e.name.as_str())
        .filter(|n| right_names.contains(n))
        .collect();
    let right_order: Vec<&str> = right
        .iter()
        .map(|e| e.name.as_str())
        .filter(|n| left_names.contains(n))
        .collect();
    if left_order != right_order {
        out.push(DiffEntry::Structural {
            path: path.to_string(),
            description: format!(
                "entry order changed: left=[{}] right=[{}]",
                left_order.join(","),
                right_order.join(",")
            ),
        });
    }
}

fn diff_settings(
    left: &[Setting],
    right: &[Setting],
    path: &str,
    opts: &DiffOptions,
    out: &mut Vec<DiffEntry>,
) {
    for l in left {
        let setting_path = join_path(path, &l.key);
        if should_ignore(&setting_path, opts) {
            continue;
        }
        match right.iter().find(|r| r.key == l.key) {
            Some(r) if r.op == l.op && r.values == l.values => {}
            Some(r) => out.push(DiffEntry::Modified {
                path: setting_path,
                left: render_setting(l),
                right: render_setting(r),
            }),
            None => out.push(DiffEntry::OnlyLeft {
                path: setting_path,
                value: render_setting(l),
            }),
        }
    }

    for r in right {
        if left.iter().any(|l| l.key == r.key) {
            continue;
        }
        let setting_path = join_path(path, &r.key);
        if should_ignore(&setting_path, opts) {
            continue;
        }
        out.push(DiffEntry::OnlyRight {
            path: setting_path,
            value: render_setting(r),
        });
    }
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

fn should_ignore(path: &str, opts: &DiffOptions) -> bool {
    opts.ignore_paths.iter().any(|ignore| {
        path == ignore
            || path.ends_with(&format!(".{ignore}"))
            || path.starts_with(&format!("{ignore}."))
            || path.starts_with(&format!("{ignore}["))
            || path.contains(&format!(".{ignore}["))
            || path.contains(&format!(".{ignore}."))
    })
}

fn render_setting(setting: &Setting) -> String {
    match setting.op {
        SetOp::Set => setting.joined(),
        SetOp::Unset => "<unset>".to_string(),
    }
}

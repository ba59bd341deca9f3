use forticonf_core::{ConfigBlock, ConfigEntry, ConfigTree};

/// Render the block structure of a configuration with a configurable max depth.
///
/// Each `config` block is one line, each `edit` entry one line with its
/// setting count. Depth 0 lists only the top-level sections.
pub fn render_tree(tree: &ConfigTree, max_depth: usize) -> String {
    let mut out = String::new();
    for block in &tree.blocks {
        render_block(block, 0, max_depth, &mut out);
    }
    out
}

/// Render one block and everything below it.
pub fn render_section(block: &ConfigBlock, max_depth: usize) -> String {
    let mut out = String::new();
    render_block(block, 0, max_depth, &mut out);
    out
}

fn render_block(block: &ConfigBlock, depth: usize, max_depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!("{indent}{}", block.section));
    if !block.settings.is_empty() {
        out.push_str(&format!(" ({} settings)", block.settings.len()));
    }
    if !block.entries.is_empty() {
        out.push_str(&format!(" [{} entries]", block.entries.len()));
    }
    out.push('\n');

    if depth >= max_depth {
        return;
    }

    for entry in &block.entries {
        render_entry(entry, depth + 1, max_depth, out);
    }
    for child in &block.blocks {
        render_block(child, depth + 1, max_depth, out);
    }
}

fn render_entry(entry: &ConfigEntry, depth: usize, max_depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!(
        "{indent}edit {} ({} settings)\n",
        entry.name,
        entry.settings.len()
    ));

    if depth >= max_depth {
        return;
    }

    for child in &entry.blocks {
        render_block(child, depth + 1, max_depth, out);
    }
}

use std::path::PathBuf;

use forticonf_core::{
    parse, parse_file, write, write_file, ConfigBlock, ConfigEntry, ConfigTree,
};
use pretty_assertions::assert_eq;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn without_lines(mut tree: ConfigTree) -> ConfigTree {
    fn block(b: &mut ConfigBlock) {
        b.line = 0;
        b.settings.iter_mut().for_each(|s| s.line = 0);
        b.entries.iter_mut().for_each(entry);
        b.blocks.iter_mut().for_each(block);
    }
    fn entry(e: &mut ConfigEntry) {
        e.line = 0;
        e.settings.iter_mut().for_each(|s| s.line = 0);
        e.blocks.iter_mut().for_each(block);
    }
    tree.blocks.iter_mut().for_each(block);
    tree.notes.iter_mut().for_each(|n| n.line = 0);
    tree
}

#[test]
fn parse_write_parse_round_trip_preserves_tree_shape() {
    let first = parse_file(&fixture("fixtures/fortigate-basic.conf")).expect("initial parse");

    let written = write(&first);
    let second = parse(&written).expect("re-parse should succeed");

    assert_eq!(without_lines(first), without_lines(second));
}

#[test]
fn canonical_output_is_stable() {
    let first = parse_file(&fixture("fixtures/fortigate-vdom.conf")).expect("parse");
    let once = write(&first);
    let twice = write(&parse(&once).expect("re-parse"));
    assert_eq!(once, twice);
}

#[test]
fn parse_and_write_file_round_trip() {
    let source_path = fixture("fixtures/fortigate-vdom.conf");
    let out_dir = tempfile::tempdir().expect("tempdir should be created");
    let out_path = out_dir.path().join("roundtrip.conf");

    let tree = parse_file(&source_path).expect("parse should succeed");
    write_file(&tree, &out_path).expect("write_file should succeed");

    let reparsed = parse_file(&out_path).expect("parse_file should succeed");
    assert_eq!(without_lines(tree), without_lines(reparsed));
}

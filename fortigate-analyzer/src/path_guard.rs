use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Refuse an output path that points at one of the input configurations.
pub fn ensure_output_not_same(output: &Path, inputs: &[&Path]) -> Result<()> {
    let output_abs = absolute(output)
        .with_context(|| format!("failed to resolve output path {}", output.display()))?;

    for input in inputs {
        let input_abs = absolute(input)
            .with_context(|| format!("failed to resolve input path {}", input.display()))?;
        if output_abs == input_abs {
            bail!(
                "refusing to overwrite input configuration {} with export output",
                input.display()
            );
        }
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return path
            .canonicalize()
            .with_context(|| format!("canonicalize {}", path.display()));
    }

    // Not on disk yet: join with the working directory without resolving `..`.
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("current_dir")?
        .join(path))
}

#[cfg(test)]
mod tests {
    use super::ensure_output_not_same;

    #[test]
    fn same_file_is_rejected_and_new_file_allowed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("fw.conf");
        std::fs::write(&input, "").expect("write");

        let err = ensure_output_not_same(&input, &[&input]).expect_err("same path");
        assert!(err.to_string().contains("refusing to overwrite"));

        let output = dir.path().join("graph.dot");
        assert!(ensure_output_not_same(&output, &[&input]).is_ok());
    }
}

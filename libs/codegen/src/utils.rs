use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::generators::rust::SourceBundle;

/// Write a generated bundle to the given output directory.
/// Creates the directory if it does not exist.
pub fn write_modules(output_dir: &Path, bundle: &SourceBundle) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    for (filename, contents) in &bundle.files {
        let path = output_dir.join(filename);
        fs::write(&path, contents)
            .with_context(|| format!("writing generated file {}", path.display()))?;
    }

    tracing::debug!(
        files = bundle.files.len(),
        output = %output_dir.display(),
        "Wrote generated modules"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_modules_creates_directory() {
        let dir = std::env::temp_dir()
            .join(format!("metrum-codegen-{}", uuid::Uuid::new_v4()))
            .join("units");
        let bundle = SourceBundle {
            module: "units".into(),
            files: BTreeMap::from([
                ("mod.rs".to_string(), "pub mod meter;\n".to_string()),
                ("meter.rs".to_string(), "pub struct Meter(pub f64);\n".to_string()),
            ]),
        };

        write_modules(&dir, &bundle).unwrap();

        assert_eq!(fs::read_to_string(dir.join("mod.rs")).unwrap(), "pub mod meter;\n");
        assert!(dir.join("meter.rs").exists());
        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }
}

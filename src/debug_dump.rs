//! Per-stage diagnostic dumps.
//!
//! When [`ComparerSettings::debug_dir`] is set, each pipeline stage
//! serializes its artifact as pretty JSON into that directory. Dumps are
//! a side channel: failures are logged and never affect the result.

use std::io;
use std::path::Path;

use serde::Serialize;

use crate::settings::ComparerSettings;

/// Serialize `value` as `<debug_dir>/<name>.json`, if dumping is enabled.
pub fn dump<T: Serialize>(settings: &ComparerSettings, name: &str, value: &T) {
    let Some(dir) = &settings.debug_dir else {
        return;
    };
    if let Err(err) = write(dir, name, value) {
        tracing::warn!(name, error = %err, "debug dump failed");
    }
}

fn write<T: Serialize>(dir: &Path, name: &str, value: &T) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(dir.join(format!("{name}.json")), json)
}

#[cfg(test)]
mod tests {
    use redline_model::builder;

    use super::*;

    #[test]
    fn disabled_by_default() {
        let settings = ComparerSettings::default();
        // Must be a no-op without a directory configured.
        dump(&settings, "never-written", &builder::para("x"));
    }

    #[test]
    fn writes_pretty_json_into_the_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = ComparerSettings {
            debug_dir: Some(dir.path().to_path_buf()),
            ..ComparerSettings::default()
        };
        dump(&settings, "source1-step1-preprocess", &builder::para("hello"));

        let path = dir.path().join("source1-step1-preprocess.json");
        let contents = std::fs::read_to_string(path).expect("dump file");
        assert!(contents.contains("hello"));
        assert!(contents.contains('\n'), "pretty-printed");
    }
}

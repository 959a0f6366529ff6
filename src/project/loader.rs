//! Loading unit sources from a directory tree.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::base::UnitName;
use crate::error::ExtractError;
use crate::host::Host;

const UNIT_EXTENSION: &str = "unit";

/// Walk a directory tree and register every `.unit` file with the host,
/// deriving dotted unit names from relative paths (`pkg/sub/mod.unit`
/// becomes `pkg.sub.mod`). Returns the registered names.
pub fn load_directory(host: &mut Host, root: &Path) -> Result<Vec<UnitName>, ExtractError> {
    if !root.is_dir() {
        return Err(ExtractError::DirectoryNotFound(
            root.display().to_string(),
        ));
    }
    let mut loaded = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(UNIT_EXTENSION)
        {
            continue;
        }
        let name = unit_name_for(root, path)?;
        let text = std::fs::read_to_string(path)?;
        let origin: Arc<str> = Arc::from(path.display().to_string());
        debug!(unit = %name, origin = %origin, "registering unit source");
        host.add_source_file(name.clone(), &text, origin)?;
        loaded.push(name);
    }
    info!(root = %root.display(), units = loaded.len(), "loaded unit sources");
    Ok(loaded)
}

fn unit_name_for(root: &Path, path: &Path) -> Result<UnitName, ExtractError> {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    let mut dotted = String::new();
    for component in relative.components() {
        if !dotted.is_empty() {
            dotted.push('.');
        }
        dotted.push_str(&component.as_os_str().to_string_lossy());
    }
    Ok(UnitName::new(&dotted)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn loads_nested_unit_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "mypkg/mod.unit", "let a = 1;");
        write(dir.path(), "mypkg/sub/inner.unit", "let b = 2;");
        write(dir.path(), "mypkg/notes.txt", "ignored");

        let mut host = Host::new();
        let loaded = load_directory(&mut host, dir.path()).unwrap();
        let names: Vec<_> = loaded.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["mypkg.mod", "mypkg.sub.inner"]);
        assert!(host.sources().contains("mypkg.sub.inner"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let mut host = Host::new();
        let err = load_directory(&mut host, Path::new("/no/such/dir")).unwrap_err();
        assert!(matches!(err, ExtractError::DirectoryNotFound(_)));
    }

    #[test]
    fn malformed_source_reports_unit_name() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "mypkg/bad.unit", "let = ;");
        let mut host = Host::new();
        let err = load_directory(&mut host, dir.path()).unwrap_err();
        assert!(err.to_string().contains("mypkg.bad"));
    }
}

//! SW-013: Synth artifacts — template and lock file, written atomically.

use super::emitter::{OutputFormat, Template};
use super::types::{ResourceLock, StackLock};
use crate::provenance::{eventlog, hasher};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

pub const LOCK_SCHEMA: &str = "1.0";

/// Lock file path within the output directory.
pub fn lock_file_path(out_dir: &Path) -> PathBuf {
    out_dir.join("stack.lock.yaml")
}

/// Template path within the output directory.
pub fn template_path(out_dir: &Path, format: OutputFormat) -> PathBuf {
    out_dir.join(format!("template.{}", format.extension()))
}

/// Write the rendered template and remove any template left behind in
/// another format, so the directory holds only what the lock describes.
pub fn write_template(out_dir: &Path, format: OutputFormat, rendered: &str) -> Result<PathBuf, String> {
    let path = template_path(out_dir, format);
    write_atomic(&path, rendered)?;
    for other in OutputFormat::ALL.into_iter().filter(|f| *f != format) {
        let stale = template_path(out_dir, other);
        if stale.exists() {
            std::fs::remove_file(&stale)
                .map_err(|e| format!("cannot remove {}: {}", stale.display(), e))?;
        }
    }
    Ok(path)
}

/// Load the lock file. Returns None if it doesn't exist.
pub fn load_lock(out_dir: &Path) -> Result<Option<StackLock>, String> {
    let path = lock_file_path(out_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let lock: StackLock = serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("invalid lock file {}: {}", path.display(), e))?;
    Ok(Some(lock))
}

/// Save the lock file atomically.
pub fn save_lock(out_dir: &Path, lock: &StackLock) -> Result<(), String> {
    let yaml = serde_yaml_ng::to_string(lock).map_err(|e| format!("serialize error: {}", e))?;
    write_atomic(&lock_file_path(out_dir), &yaml)
}

/// Write `contents` to `path` via a temp file and rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create dir {}: {}", parent.display(), e))?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, contents)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })
}

/// Hash of one resource entry as it appears in the template.
pub fn resource_hash(resource: &super::emitter::TemplateResource) -> Result<String, String> {
    hasher::hash_json(resource)
}

/// Build a lock describing `template`, whose rendered form is `rendered`.
pub fn new_lock(stack: &str, template: &Template, rendered: &str) -> Result<StackLock, String> {
    let mut resources = IndexMap::with_capacity(template.resources.len());
    for (id, resource) in &template.resources {
        resources.insert(
            id.clone(),
            ResourceLock {
                resource_type: resource.resource_type.clone(),
                hash: resource_hash(resource)?,
            },
        );
    }
    Ok(StackLock {
        schema: LOCK_SCHEMA.to_string(),
        stack: stack.to_string(),
        generated_at: eventlog::now_iso8601(),
        generator: format!("stackwright {}", env!("CARGO_PKG_VERSION")),
        template_hash: hasher::hash_string(rendered),
        resources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{compose, emitter};

    fn template() -> Template {
        let config =
            crate::core::parser::parse_config("computeSize: small\ndbSize: small\n").unwrap();
        emitter::emit(&compose::compose(&config).unwrap()).unwrap()
    }

    #[test]
    fn test_sw013_lock_file_path() {
        assert_eq!(
            lock_file_path(Path::new("/out")),
            PathBuf::from("/out/stack.lock.yaml")
        );
        assert_eq!(
            template_path(Path::new("/out"), OutputFormat::Yaml),
            PathBuf::from("/out/template.yaml")
        );
    }

    #[test]
    fn test_sw013_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_lock(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_sw013_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let t = template();
        let rendered = t.render(OutputFormat::Json).unwrap();
        let lock = new_lock("bitbucket", &t, &rendered).unwrap();
        save_lock(dir.path(), &lock).unwrap();

        let loaded = load_lock(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.stack, "bitbucket");
        assert_eq!(loaded.template_hash, hasher::hash_string(&rendered));
        let ids: Vec<&String> = loaded.resources.keys().collect();
        assert_eq!(ids, vec!["Network", "Database", "FileSystem", "Application"]);
        assert_eq!(loaded.resources["Database"].resource_type, "AWS::RDS::DBCluster");
        assert!(!dir.path().join("stack.lock.yaml.tmp").exists());
    }

    #[test]
    fn test_sw013_invalid_lock() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(lock_file_path(dir.path()), "schema: [").unwrap();
        assert!(load_lock(dir.path()).unwrap_err().contains("invalid lock file"));
    }

    #[test]
    fn test_sw013_write_template_replaces_other_format() {
        let dir = tempfile::tempdir().unwrap();
        let t = template();
        let json = t.render(OutputFormat::Json).unwrap();
        let yaml = t.render(OutputFormat::Yaml).unwrap();
        write_template(dir.path(), OutputFormat::Json, &json).unwrap();
        assert!(dir.path().join("template.json").exists());

        let path = write_template(dir.path(), OutputFormat::Yaml, &yaml).unwrap();
        assert_eq!(path, dir.path().join("template.yaml"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), yaml);
        assert!(!dir.path().join("template.json").exists());
    }

    #[test]
    fn test_sw013_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/template.json");
        write_atomic(&path, "{}\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
    }
}

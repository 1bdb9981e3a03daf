//! Rule file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use npcinv_types::RuleDescriptor;

use super::{RuleError, RuleSource};

pub const RULE_FILE_EXTENSION: &str = "ifl";

/// Result of a discovery pass.
#[derive(Debug)]
pub struct LoadedRules {
    /// Folder the rule locations are relative to
    pub directory: PathBuf,
    /// Updated descriptor list to persist back into settings
    pub descriptors: Vec<RuleDescriptor>,
    /// One source per descriptor, same order
    pub sources: Vec<RuleSource>,
    /// Non-fatal problems (missing files, missing custom folder)
    pub errors: Vec<RuleError>,
}

/// Supplies rule text for an ordered descriptor list.
pub trait RuleSourceProvider {
    /// Reconcile `existing` with what is available and read enabled rules.
    ///
    /// Only a failure to enumerate rules at all is an `Err`.
    fn load(&self, existing: &[RuleDescriptor]) -> Result<LoadedRules, RuleError>;
}

/// Rules stored as `*.ifl` files in a folder.
///
/// The folder is the plugin config folder unless a custom folder is set,
/// which is resolved relative to the config folder's parent.
#[derive(Debug, Clone)]
pub struct RuleDirectory {
    config_dir: PathBuf,
    custom_dir: Option<String>,
}

impl RuleDirectory {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            custom_dir: None,
        }
    }

    /// Blank names are ignored.
    pub fn with_custom_dir(mut self, custom_dir: &str) -> Self {
        let trimmed = custom_dir.trim();
        self.custom_dir = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Folder rules are read from, plus an error when a configured custom
    /// folder does not exist.
    pub fn resolve(&self) -> (PathBuf, Option<RuleError>) {
        let Some(custom) = &self.custom_dir else {
            return (self.config_dir.clone(), None);
        };
        let base = self.config_dir.parent().unwrap_or(&self.config_dir);
        let candidate = base.join(custom);
        if candidate.is_dir() {
            (candidate, None)
        } else {
            tracing::error!(path = ?candidate, "Custom rule folder does not exist");
            (self.config_dir.clone(), Some(RuleError::MissingCustomFolder(candidate)))
        }
    }
}

fn is_rule_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(RULE_FILE_EXTENSION))
}

/// Rule files directly inside `dir`, sorted by name, as disabled descriptors.
fn discover(dir: &Path) -> Result<Vec<RuleDescriptor>, RuleError> {
    let entries = fs::read_dir(dir).map_err(|source| RuleError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut found: Vec<RuleDescriptor> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_rule_file(path))
        .filter_map(|path| {
            let file_name = path.file_name()?.to_str()?.to_string();
            Some(RuleDescriptor::new(file_name.clone(), file_name, false))
        })
        .collect();
    found.sort_by(|a, b| a.location.cmp(&b.location));
    Ok(found)
}

impl RuleSourceProvider for RuleDirectory {
    fn load(&self, existing: &[RuleDescriptor]) -> Result<LoadedRules, RuleError> {
        let (directory, folder_error) = self.resolve();
        let mut errors: Vec<RuleError> = folder_error.into_iter().collect();
        let discovered = discover(&directory)?;

        let mut descriptors = Vec::with_capacity(existing.len() + discovered.len());
        for rule in existing {
            let path = directory.join(&rule.location);
            if path.is_file() {
                descriptors.push(rule.clone());
            } else {
                tracing::warn!(rule = %rule.name, path = ?path, "Rule file not found");
                errors.push(RuleError::MissingFile {
                    rule: rule.name.clone(),
                    path,
                });
            }
        }

        for found in discovered {
            let known = descriptors
                .iter()
                .any(|d| d.location.eq_ignore_ascii_case(&found.location));
            if !known {
                tracing::info!(rule = %found.name, "Discovered new rule file");
                descriptors.push(found);
            }
        }

        let sources = descriptors
            .iter()
            .map(|descriptor| {
                if !descriptor.enabled {
                    return RuleSource::disabled(descriptor.clone());
                }
                match fs::read_to_string(directory.join(&descriptor.location)) {
                    Ok(text) => RuleSource::new(descriptor.clone(), text),
                    Err(e) => RuleSource::unreadable(descriptor.clone(), e.to_string()),
                }
            })
            .collect();

        Ok(LoadedRules {
            directory,
            descriptors,
            sources,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, text: &str) {
        fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn test_existing_order_kept_new_files_appended_disabled() {
        let tmp = tempdir().unwrap();
        write(tmp.path(), "b.ifl", "true");
        write(tmp.path(), "a.ifl", "false");
        write(tmp.path(), "c.IFL", "true");
        write(tmp.path(), "notes.txt", "ignored");

        let existing = vec![RuleDescriptor::new("mine", "b.ifl", true)];
        let loaded = RuleDirectory::new(tmp.path()).load(&existing).unwrap();

        let locations: Vec<_> = loaded.descriptors.iter().map(|d| d.location.as_str()).collect();
        assert_eq!(locations, ["b.ifl", "a.ifl", "c.IFL"]);
        assert!(loaded.descriptors[0].enabled);
        assert_eq!(loaded.descriptors[0].name, "mine");
        assert!(!loaded.descriptors[1].enabled);
        assert!(!loaded.descriptors[2].enabled);
        assert!(loaded.errors.is_empty());

        assert_eq!(loaded.sources.len(), 3);
        assert!(matches!(&loaded.sources[0].text, Some(Ok(text)) if text == "true"));
        assert!(loaded.sources[1].text.is_none());
    }

    #[test]
    fn test_missing_file_is_dropped_and_reported() {
        let tmp = tempdir().unwrap();
        write(tmp.path(), "kept.ifl", "true");

        let existing = vec![
            RuleDescriptor::new("gone", "gone.ifl", true),
            RuleDescriptor::new("kept", "kept.ifl", true),
        ];
        let loaded = RuleDirectory::new(tmp.path()).load(&existing).unwrap();

        assert_eq!(loaded.descriptors.len(), 1);
        assert_eq!(loaded.descriptors[0].name, "kept");
        assert!(matches!(
            &loaded.errors[..],
            [RuleError::MissingFile { rule, .. }] if rule == "gone"
        ));
    }

    #[test]
    fn test_discovery_matches_existing_case_insensitively() {
        let tmp = tempdir().unwrap();
        write(tmp.path(), "Rares.ifl", "true");

        let existing = vec![RuleDescriptor::new("rares", "Rares.IFL", true)];
        // Lookup of the existing location depends on the filesystem's case
        // rules, so only check that discovery does not add a duplicate.
        let loaded = RuleDirectory::new(tmp.path()).load(&existing).unwrap();
        let count = loaded
            .descriptors
            .iter()
            .filter(|d| d.location.eq_ignore_ascii_case("rares.ifl"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_custom_folder_is_relative_to_config_parent() {
        let tmp = tempdir().unwrap();
        let config = tmp.path().join("config").join("NPCInv");
        let custom = tmp.path().join("config").join("shared-rules");
        fs::create_dir_all(&config).unwrap();
        fs::create_dir_all(&custom).unwrap();
        write(&custom, "shared.ifl", "true");

        let loaded = RuleDirectory::new(&config)
            .with_custom_dir("shared-rules")
            .load(&[])
            .unwrap();

        assert_eq!(loaded.directory, custom);
        assert_eq!(loaded.descriptors.len(), 1);
    }

    #[test]
    fn test_missing_custom_folder_falls_back() {
        let tmp = tempdir().unwrap();
        let config = tmp.path().join("NPCInv");
        fs::create_dir_all(&config).unwrap();
        write(&config, "local.ifl", "true");

        let loaded = RuleDirectory::new(&config)
            .with_custom_dir("nowhere")
            .load(&[])
            .unwrap();

        assert_eq!(loaded.directory, config);
        assert_eq!(loaded.descriptors.len(), 1);
        assert!(matches!(&loaded.errors[..], [RuleError::MissingCustomFolder(_)]));
    }

    #[test]
    fn test_unreadable_directory_is_an_error() {
        let tmp = tempdir().unwrap();
        let result = RuleDirectory::new(tmp.path().join("absent")).load(&[]);
        assert!(matches!(result, Err(RuleError::Io { .. })));
    }
}

pub mod catalog;
pub mod question;

use crate::error::{JournalError, Result};
use crate::journal::is_fixed_column;
use crate::registry::question::Question;
use crate::store::{self, FileLock};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

type RegistryMap = BTreeMap<String, Vec<Question>>;

/// Child name -> ordered question list, backed by one JSON object on disk.
///
/// Every call reads the whole file under an exclusive lock; every mutation
/// rewrites it in full before returning.
#[derive(Debug, Clone)]
pub struct QuestionRegistry {
    path: PathBuf,
}

impl QuestionRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure_exists(&self) -> Result<()> {
        let _lock = FileLock::acquire(&self.path)?;
        if !self.path.exists() {
            self.save_unlocked(&RegistryMap::new())?;
            info!(path = %self.path.display(), "created empty question registry");
        }

        Ok(())
    }

    pub fn get_children(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    pub fn contains(&self, child: &str) -> Result<bool> {
        Ok(self.load()?.contains_key(child.trim()))
    }

    pub fn get_questions(&self, child: &str) -> Result<Vec<Question>> {
        Ok(self.load()?.remove(child.trim()).unwrap_or_default())
    }

    /// Every registered question across all children, first occurrence wins.
    pub fn all_questions(&self) -> Result<Vec<Question>> {
        let mut seen = HashSet::new();
        let questions = self
            .load()?
            .into_values()
            .flatten()
            .filter(|question| seen.insert(question.text.clone()))
            .collect();

        Ok(questions)
    }

    /// Returns the trimmed name that was registered.
    pub fn add_child(&self, name: &str) -> Result<String> {
        let name = validate_child_name(name)?;

        let _lock = FileLock::acquire(&self.path)?;
        let mut registry = self.load_unlocked()?;
        if registry.contains_key(&name) {
            return Ok(name);
        }

        registry.insert(name.clone(), Vec::new());
        self.save_unlocked(&registry)?;
        info!(child = %name, "child added to registry");

        Ok(name)
    }

    /// Replaces the child's list with `predefined ++ custom`.
    ///
    /// Predefined entries take their kind from the catalog; texts the catalog
    /// does not know are inferred like custom ones. Blank entries are dropped.
    pub fn set_questions(
        &self,
        child: &str,
        predefined: &[String],
        custom: &[Question],
    ) -> Result<Vec<Question>> {
        let child = validate_child_name(child)?;

        let questions = predefined
            .iter()
            .map(|text| catalog::find(text).unwrap_or_else(|| Question::new(text.as_str())))
            .chain(custom.iter().cloned())
            .filter_map(Question::normalized)
            .collect::<Vec<_>>();

        if let Some(conflict) = questions
            .iter()
            .find(|question| is_fixed_column(&question.text))
        {
            return Err(JournalError::SchemaConflict(conflict.text.clone()));
        }

        let _lock = FileLock::acquire(&self.path)?;
        let mut registry = self.load_unlocked()?;
        registry.insert(child.clone(), questions.clone());
        self.save_unlocked(&registry)?;
        info!(child = %child, count = questions.len(), "question list replaced");

        Ok(questions)
    }

    fn load(&self) -> Result<RegistryMap> {
        let _lock = FileLock::acquire(&self.path)?;
        self.load_unlocked()
    }

    fn load_unlocked(&self) -> Result<RegistryMap> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(RegistryMap::new()),
            Err(error) if error.kind() == ErrorKind::InvalidData => {
                store::quarantine(&self.path, "registry is not valid UTF-8");
                return Ok(RegistryMap::new());
            }
            Err(error) => return Err(error.into()),
        };

        if content.trim().is_empty() {
            return Ok(RegistryMap::new());
        }

        match serde_json::from_str::<RegistryMap>(&content) {
            Ok(registry) => Ok(registry),
            Err(error) => {
                store::quarantine(&self.path, &format!("registry JSON is malformed: {error}"));
                Ok(RegistryMap::new())
            }
        }
    }

    fn save_unlocked(&self, registry: &RegistryMap) -> Result<()> {
        let content = serde_json::to_string_pretty(registry)?;
        store::write_atomic(&self.path, content.as_bytes())
    }
}

pub fn validate_child_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(JournalError::InvalidInput(
            "child name must not be empty".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

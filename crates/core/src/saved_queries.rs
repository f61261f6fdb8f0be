use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::config_dir;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedQuery {
    pub title: String,
    pub page_path: String,
    #[serde(default)]
    pub feature_on_homepage: bool,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl SavedQuery {
    /// Trims both fields and rejects blanks.
    pub fn new(
        title: &str,
        page_path: &str,
        feature_on_homepage: bool,
    ) -> Result<Self, SavedQueryError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SavedQueryError::EmptyTitle);
        }
        let page_path = page_path.trim();
        if page_path.is_empty() {
            return Err(SavedQueryError::EmptyPagePath);
        }

        Ok(Self {
            title: title.to_string(),
            page_path: page_path.to_string(),
            feature_on_homepage,
            prompt: None,
        })
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// `"Monthly Revenue!"` becomes `/monthly-revenue`.
#[must_use]
pub fn suggested_page_path(title: &str) -> String {
    let mut slug = String::with_capacity(title.len() + 1);
    slug.push('/');
    let mut pending_dash = false;
    for ch in title.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && slug.len() > 1 {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SavedQueryError {
    #[error("title is required")]
    EmptyTitle,
    #[error("page path is required")]
    EmptyPagePath,
}

#[derive(Debug, Error)]
pub enum SavedQueriesError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read saved queries file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse saved queries file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to create config directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize saved queries: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write saved queries file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SavedQueriesDocument {
    #[serde(default)]
    queries: Vec<SavedQuery>,
}

impl SavedQueriesDocument {
    fn normalize(&mut self) {
        let mut by_path = BTreeMap::new();
        for query in self.queries.drain(..) {
            by_path.insert(query.page_path.clone(), query);
        }
        self.queries = by_path.into_values().collect();
    }
}

/// Saved queries keyed by page path. A later save to the same path
/// replaces the earlier one.
#[derive(Debug, Clone)]
pub struct FileSavedQueriesStore {
    path: PathBuf,
    queries: Vec<SavedQuery>,
}

impl FileSavedQueriesStore {
    pub fn load_default() -> Result<Self, SavedQueriesError> {
        Self::load_from_path(default_saved_queries_path()?)
    }

    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, SavedQueriesError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                queries: Vec::new(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| SavedQueriesError::Read {
            path: path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self {
                path,
                queries: Vec::new(),
            });
        }

        let mut doc: SavedQueriesDocument =
            toml::from_str(&raw).map_err(|source| SavedQueriesError::Parse {
                path: path.clone(),
                source,
            })?;
        doc.normalize();

        Ok(Self {
            path,
            queries: doc.queries,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn queries(&self) -> &[SavedQuery] {
        &self.queries
    }

    #[must_use]
    pub fn query(&self, page_path: &str) -> Option<&SavedQuery> {
        self.queries
            .iter()
            .find(|query| query.page_path == page_path)
    }

    pub fn featured(&self) -> impl Iterator<Item = &SavedQuery> {
        self.queries
            .iter()
            .filter(|query| query.feature_on_homepage)
    }

    pub fn upsert_query(&mut self, query: SavedQuery) {
        info!(title = %query.title, page_path = %query.page_path, "saved query");
        if let Some(existing) = self
            .queries
            .iter_mut()
            .find(|existing| existing.page_path == query.page_path)
        {
            *existing = query;
        } else {
            self.queries.push(query);
            self.queries
                .sort_unstable_by(|a, b| a.page_path.cmp(&b.page_path));
        }
    }

    #[must_use]
    pub fn delete_query(&mut self, page_path: &str) -> bool {
        let original_len = self.queries.len();
        self.queries.retain(|query| query.page_path != page_path);
        self.queries.len() != original_len
    }

    pub fn persist(&self) -> Result<(), SavedQueriesError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| SavedQueriesError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let doc = SavedQueriesDocument {
            queries: self.queries.clone(),
        };
        let rendered = toml::to_string_pretty(&doc)
            .map_err(|source| SavedQueriesError::Serialize { source })?;

        fs::write(&self.path, rendered).map_err(|source| SavedQueriesError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

pub fn default_saved_queries_path() -> Result<PathBuf, SavedQueriesError> {
    let dir = config_dir().map_err(|_| SavedQueriesError::ConfigDirUnavailable)?;
    Ok(dir.join("saved_queries.toml"))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{suggested_page_path, FileSavedQueriesStore, SavedQuery, SavedQueryError};

    #[test]
    fn new_trims_and_requires_fields() {
        let query = SavedQuery::new("  Monthly revenue ", " /revenue ", true)
            .expect("valid query");
        assert_eq!(query.title, "Monthly revenue");
        assert_eq!(query.page_path, "/revenue");
        assert!(query.feature_on_homepage);

        assert_eq!(
            SavedQuery::new("   ", "/x", false),
            Err(SavedQueryError::EmptyTitle)
        );
        assert_eq!(
            SavedQuery::new("Title", "\t", false),
            Err(SavedQueryError::EmptyPagePath)
        );
    }

    #[test]
    fn suggested_page_path_slugs_the_title() {
        assert_eq!(suggested_page_path("Monthly Revenue!"), "/monthly-revenue");
        assert_eq!(suggested_page_path("  Top 10 users  "), "/top-10-users");
        assert_eq!(suggested_page_path("***"), "/");
    }

    #[test]
    fn missing_file_loads_empty_store() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let store = FileSavedQueriesStore::load_from_path(temp_dir.path().join("saved.toml"))
            .expect("failed to load store");
        assert!(store.queries().is_empty());
    }

    #[test]
    fn upsert_persist_and_reload() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("nested").join("saved.toml");

        let mut store = FileSavedQueriesStore::load_from_path(&path).expect("failed to load");
        store.upsert_query(
            SavedQuery::new("Users", "/users", false)
                .expect("valid query")
                .with_prompt("list users"),
        );
        store.upsert_query(SavedQuery::new("Revenue", "/revenue", true).expect("valid query"));
        store.upsert_query(SavedQuery::new("All users", "/users", true).expect("valid query"));
        store.persist().expect("failed to persist store");

        let reloaded = FileSavedQueriesStore::load_from_path(&path).expect("failed to reload");
        assert_eq!(reloaded.queries().len(), 2);
        assert_eq!(reloaded.queries()[0].page_path, "/revenue");
        let users = reloaded.query("/users").expect("users query should exist");
        assert_eq!(users.title, "All users");
        assert_eq!(users.prompt, None);
        assert_eq!(reloaded.featured().count(), 2);
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let mut store = FileSavedQueriesStore::load_from_path(temp_dir.path().join("saved.toml"))
            .expect("failed to load");
        store.upsert_query(SavedQuery::new("Users", "/users", false).expect("valid query"));

        assert!(store.delete_query("/users"));
        assert!(!store.delete_query("/users"));
        assert!(store.queries().is_empty());
    }
}

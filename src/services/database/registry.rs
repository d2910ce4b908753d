use crate::api::middleware::AppError;
use crate::config::WorkspaceConfig;
use crate::services::database::{create_adapter, DatabaseAdapter, DatabaseKind};
use crate::storage::store_path;
use std::collections::HashSet;
use std::path::Path;

/// A database the gateway knows by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHandle {
    pub name: String,
    pub kind: DatabaseKind,
    /// File path for SQLite, connection URL otherwise
    pub location: String,
}

impl DatabaseHandle {
    pub fn sqlite(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DatabaseKind::Sqlite,
            location: path.into(),
        }
    }

    /// Location safe to log
    pub fn display_location(&self) -> String {
        match self.kind {
            DatabaseKind::Sqlite => self.location.clone(),
            _ => mask_credentials(&self.location),
        }
    }
}

/// Ordered set of databases. The first one is the routing default.
#[derive(Debug, Clone, Default)]
pub struct DatabaseRegistry {
    handles: Vec<DatabaseHandle>,
}

impl DatabaseRegistry {
    /// Enumerate `*.db` files of the workspace (sorted by file name) followed
    /// by the configured extra connections. The description store is never
    /// enumerated, even when it lives inside the workspace.
    pub fn discover(workspace: &WorkspaceConfig, description_store: &str) -> Result<Self, AppError> {
        let excluded = Path::new(store_path(description_store)).canonicalize().ok();
        let mut handles = Self::scan_workspace(Path::new(&workspace.path), excluded.as_deref())?;

        for entry in &workspace.extra_databases {
            let (name, url) = entry.split_once('=').ok_or_else(|| {
                AppError::Validation(format!(
                    "Extra database entry must look like name=url: {}",
                    mask_credentials(entry)
                ))
            })?;
            let name = name.trim();
            let url = url.trim();
            if name.is_empty() {
                return Err(AppError::Validation("Extra database name cannot be empty".to_string()));
            }
            handles.push(DatabaseHandle {
                name: name.to_string(),
                kind: DatabaseKind::from_url(url)?,
                location: url.to_string(),
            });
        }

        let registry = Self::from_handles(handles);
        tracing::info!(
            "Discovered {} databases: {}",
            registry.handles.len(),
            registry.names().join(", ")
        );
        Ok(registry)
    }

    /// Build from explicit handles. Later duplicates of a name are dropped.
    pub fn from_handles(handles: Vec<DatabaseHandle>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(handles.len());
        for handle in handles {
            if seen.insert(handle.name.clone()) {
                kept.push(handle);
            } else {
                tracing::warn!(
                    "Skipping duplicate database name {} at {}",
                    handle.name,
                    handle.display_location()
                );
            }
        }
        Self { handles: kept }
    }

    fn scan_workspace(dir: &Path, excluded: Option<&Path>) -> Result<Vec<DatabaseHandle>, AppError> {
        if !dir.is_dir() {
            tracing::warn!("Database workspace {} is not a directory", dir.display());
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(dir).map_err(|e| {
            AppError::Internal(format!("Failed to read workspace {}: {}", dir.display(), e))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| AppError::Internal(format!("Failed to read workspace entry: {}", e)))?
                .path();
            let is_db = path.is_file() && path.extension().map(|ext| ext == "db").unwrap_or(false);
            if !is_db {
                continue;
            }
            if excluded.is_some() && path.canonicalize().ok().as_deref() == excluded {
                tracing::debug!("Skipping description store {}", path.display());
                continue;
            }
            files.push(path);
        }
        files.sort();

        Ok(files
            .into_iter()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?.to_string();
                Some(DatabaseHandle::sqlite(stem, path.to_string_lossy()))
            })
            .collect())
    }

    pub fn handles(&self) -> &[DatabaseHandle] {
        &self.handles
    }

    pub fn names(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Look a database up by name; a trailing `.db` is accepted
    pub fn get(&self, name: &str) -> Result<&DatabaseHandle, AppError> {
        let name = name.trim();
        let bare = name.strip_suffix(".db").unwrap_or(name);
        self.handles
            .iter()
            .find(|h| h.name == name || h.name == bare)
            .ok_or_else(|| AppError::NotFound(format!("Database '{}' not found", name)))
    }

    pub fn default_database(&self) -> Option<&DatabaseHandle> {
        self.handles.first()
    }

    pub fn adapter(&self, name: &str) -> Result<Box<dyn DatabaseAdapter>, AppError> {
        create_adapter(self.get(name)?)
    }
}

/// Hide the password of a connection URL before it reaches a log line
pub fn mask_credentials(url: &str) -> String {
    if let Ok(parsed_url) = url::Url::parse(url) {
        let mut masked = parsed_url.clone();
        if parsed_url.password().is_some() {
            let _ = masked.set_password(Some("***"));
        }
        masked.to_string()
    } else {
        "[invalid-url]".to_string()
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

pub const ENV_API_KEY: &str = "CLOUD_TODO_API_KEY";
pub const ENV_PROJECT_ID: &str = "CLOUD_TODO_PROJECT_ID";
pub const ENV_DOCUMENT_STORE: &str = "CLOUD_TODO_DOCUMENT_STORE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStoreKind {
    #[default]
    Firestore,
    Local,
}

impl DocumentStoreKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "firestore" => Some(DocumentStoreKind::Firestore),
            "local" => Some(DocumentStoreKind::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub firebase: FirebaseConfig,
    pub document_store: DocumentStoreKind,
    pub notifications: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            firebase: FirebaseConfig::default(),
            document_store: DocumentStoreKind::default(),
            notifications: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingApiKey,
    MissingProjectId,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingApiKey => {
                write!(f, "firebase.api_key is not set (or {ENV_API_KEY})")
            }
            ConfigError::MissingProjectId => {
                write!(f, "firebase.project_id is not set (or {ENV_PROJECT_ID})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Non-empty values from `lookup` replace the file's values.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(api_key) = value(ENV_API_KEY) {
            self.firebase.api_key = api_key.trim().to_string();
        }
        if let Some(project_id) = value(ENV_PROJECT_ID) {
            self.firebase.project_id = project_id.trim().to_string();
        }
        if let Some(raw) = value(ENV_DOCUMENT_STORE) {
            match DocumentStoreKind::parse(&raw) {
                Some(kind) => self.document_store = kind,
                None => log::warn!("ignoring {ENV_DOCUMENT_STORE}={raw:?}"),
            }
        }
    }

    /// Sign-in always goes through Firebase; the project id only matters for Firestore.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.firebase.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.document_store == DocumentStoreKind::Firestore
            && self.firebase.project_id.trim().is_empty()
        {
            return Err(ConfigError::MissingProjectId);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "firebase": { "api_key": "k" } }"#).unwrap();
        assert_eq!(config.firebase.api_key, "k");
        assert!(config.firebase.project_id.is_empty());
        assert_eq!(config.document_store, DocumentStoreKind::Firestore);
        assert!(config.notifications);

        let config: AppConfig =
            serde_json::from_str(r#"{ "document_store": "local", "notifications": false }"#)
                .unwrap();
        assert_eq!(config.document_store, DocumentStoreKind::Local);
        assert!(!config.notifications);
    }

    #[test]
    fn overrides_replace_non_empty_values_only() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_KEY, " env-key "),
            (ENV_PROJECT_ID, ""),
            (ENV_DOCUMENT_STORE, "LOCAL"),
        ]);
        let mut config = AppConfig::default();
        config.firebase.project_id = "from-file".to_string();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.firebase.api_key, "env-key");
        assert_eq!(config.firebase.project_id, "from-file");
        assert_eq!(config.document_store, DocumentStoreKind::Local);
    }

    #[test]
    fn unknown_store_kind_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(|name| (name == ENV_DOCUMENT_STORE).then(|| "s3".to_string()));
        assert_eq!(config.document_store, DocumentStoreKind::Firestore);
    }

    #[test]
    fn validate_requires_api_key_and_firestore_project() {
        let mut config = AppConfig::default();
        assert_eq!(config.validate(), Err(ConfigError::MissingApiKey));

        config.firebase.api_key = "k".to_string();
        assert_eq!(config.validate(), Err(ConfigError::MissingProjectId));

        config.document_store = DocumentStoreKind::Local;
        assert_eq!(config.validate(), Ok(()));

        config.document_store = DocumentStoreKind::Firestore;
        config.firebase.project_id = "p".to_string();
        assert_eq!(config.validate(), Ok(()));
    }
}

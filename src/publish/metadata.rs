//! `dataset-metadata.json` document and owner resolution

use crate::config::{PublishConfig, PublishDatasetConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_LICENSE: &str = "CC0-1.0";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct License {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchemaField {
    pub order: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResourceSchema {
    pub fields: Vec<SchemaField>,
}

/// One uploaded file
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Resource {
    pub path: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<ResourceSchema>,
}

/// Remote dataset metadata
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DatasetMetadata {
    pub title: String,
    pub id: String,
    pub licenses: Vec<License>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
    #[serde(rename = "updateFrequency", skip_serializing_if = "Option::is_none")]
    pub update_frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl DatasetMetadata {
    /// Build metadata for `files`, which are paths as configured
    pub fn build(
        dataset: &str,
        config: &PublishDatasetConfig,
        owner: &str,
        slug: &str,
        files: &[String],
    ) -> Self {
        let schema = (!config.columns.is_empty()).then(|| ResourceSchema {
            fields: config
                .columns
                .iter()
                .enumerate()
                .map(|(order, column)| SchemaField {
                    order,
                    name: column.name.clone(),
                    field_type: column.column_type.clone(),
                    description: column.description.clone(),
                })
                .collect(),
        });

        let resources = files
            .iter()
            .map(|file| Resource {
                path: file_name(file),
                description: resource_description(dataset, config, file),
                schema: schema.clone(),
            })
            .collect();

        let license = config.license.as_deref().map(map_license);

        Self {
            title: config.title.clone().unwrap_or_else(|| dataset.to_string()),
            id: format!("{}/{}", owner, slug),
            licenses: vec![License {
                name: license.unwrap_or(DEFAULT_LICENSE).to_string(),
            }],
            subtitle: config.subtitle.clone(),
            description: config.description.clone(),
            keywords: config.keywords.clone(),
            resources,
            update_frequency: config.update_frequency.clone(),
            image: None,
        }
    }

    /// Reference a thumbnail image and list it as a resource
    pub fn add_image(&mut self, file_name: &str) {
        self.image = Some(file_name.to_string());
        if self.resources.iter().any(|r| r.path == file_name) {
            return;
        }
        let description = self
            .subtitle
            .clone()
            .unwrap_or_else(|| "Thumbnail image".to_string());
        self.resources.push(Resource {
            path: file_name.to_string(),
            description,
            schema: None,
        });
    }
}

/// Licenses the hosting service does not accept map to CC0
pub fn map_license(license: &str) -> &str {
    match license {
        "MIT" | "CC0" => DEFAULT_LICENSE,
        other => other,
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn resource_description(dataset: &str, config: &PublishDatasetConfig, path: &str) -> String {
    let name = file_name(path);
    config
        .file_info
        .get(path)
        .or_else(|| config.file_info.get(&name))
        .and_then(|info| info.description.clone())
        .unwrap_or_else(|| format!("{} - {}", dataset, name))
}

/// Slug from `kaggle_slug`, else the second half of `kaggle_dataset`
pub fn resolve_slug(config: &PublishDatasetConfig) -> Option<String> {
    if let Some(slug) = config.kaggle_slug.as_deref().filter(|s| !s.is_empty()) {
        return Some(slug.to_string());
    }
    config
        .kaggle_dataset
        .as_deref()
        .and_then(|full| full.split_once('/'))
        .map(|(_, slug)| slug.to_string())
        .filter(|s| !s.is_empty())
}

/// Where an owner may come from besides configuration
#[derive(Debug, Clone, Default)]
pub struct OwnerSources {
    pub env_username: Option<String>,
    pub credentials_path: Option<PathBuf>,
}

impl OwnerSources {
    /// `KAGGLE_USERNAME` and the client's `kaggle.json`
    pub fn from_env() -> Self {
        let credentials_path = std::env::var_os("KAGGLE_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kaggle")))
            .map(|dir| dir.join("kaggle.json"));

        Self {
            env_username: std::env::var("KAGGLE_USERNAME").ok(),
            credentials_path,
        }
    }

    fn credentials_username(&self) -> Option<String> {
        #[derive(Deserialize)]
        struct Credentials {
            username: Option<String>,
            user: Option<String>,
        }

        let path = self.credentials_path.as_ref()?;
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Credentials>(&content) {
            Ok(creds) => creds.username.or(creds.user),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Unreadable credentials file");
                None
            }
        }
    }
}

/// Owner lookup order: dataset `kaggle_owner`, the owner half of
/// `kaggle_dataset`, `publish.owner`, the environment, credentials file
pub fn resolve_owner(
    config: &PublishDatasetConfig,
    publish: &PublishConfig,
    sources: &OwnerSources,
) -> Option<String> {
    let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.is_empty());

    non_empty(&config.kaggle_owner)
        .or_else(|| {
            config
                .kaggle_dataset
                .as_deref()
                .and_then(|full| full.split_once('/'))
                .map(|(owner, _)| owner.to_string())
                .filter(|s| !s.is_empty())
        })
        .or_else(|| non_empty(&publish.owner))
        .or_else(|| non_empty(&sources.env_username))
        .or_else(|| sources.credentials_username())
}

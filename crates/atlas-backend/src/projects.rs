//! Project lookup against the backend's HTTP API.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};

/// A project record as served by `GET /api/projects/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub root_path: PathBuf,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Maps a logical project id to its root directory on disk.
#[async_trait]
pub trait ProjectResolver: Send + Sync {
    async fn resolve_root(&self, project_id: &str) -> Result<PathBuf>;
}

/// HTTP client for the backend service.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: Url,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| BackendError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.base_url())
    }

    /// URL of one project record. The id is a single escaped path segment.
    fn project_url(&self, project_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "projects", project_id]);
        }
        url
    }

    /// Fetch one project. Anything short of a well-formed record is
    /// reported as an unknown project.
    pub async fn get_project(&self, project_id: &str) -> Result<Project> {
        let unknown = |reason: String| {
            log::error!("Error fetching project {project_id}: {reason}");
            BackendError::UnknownProject {
                project_id: project_id.to_string(),
                reason,
            }
        };

        if project_id.trim().is_empty() {
            return Err(unknown("empty project id".to_string()));
        }

        let response = self
            .http
            .get(self.project_url(project_id))
            .send()
            .await
            .map_err(|e| unknown(format!("backend unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unknown(format!("backend answered {status}")));
        }

        response
            .json::<Project>()
            .await
            .map_err(|e| unknown(format!("malformed project record: {e}")))
    }
}

#[async_trait]
impl ProjectResolver for BackendClient {
    async fn resolve_root(&self, project_id: &str) -> Result<PathBuf> {
        let project = self.get_project(project_id).await?;
        if !project.root_path.is_absolute() {
            return Err(BackendError::UnknownProject {
                project_id: project_id.to_string(),
                reason: format!("root path {} is not absolute", project.root_path.display()),
            });
        }
        Ok(project.root_path)
    }
}

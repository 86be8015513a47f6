//! HTTP client for the remote project service.
//!
//! Simple request/response calls; failures surface to the caller, the core
//! never retries.

use async_trait::async_trait;
use codev_core::file_tree::FileTree;
use codev_core::message::Participant;
use codev_core::project::ProjectSnapshot;
use codev_core::service::ProjectService;
use codev_core::{CodevError, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Reqwest-backed implementation of [`ProjectService`].
pub struct HttpProjectService {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ProjectResponse {
    project: ProjectSnapshot,
}

#[derive(Deserialize)]
struct UsersResponse {
    users: Vec<Participant>,
}

impl HttpProjectService {
    /// Creates a client for the service at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ProjectService for HttpProjectService {
    async fn fetch_project(&self, project_id: &str) -> Result<ProjectSnapshot> {
        debug!(project_id, "fetching project");
        let response: ProjectResponse = self
            .client
            .get(self.url(&format!("/projects/get-project/{}", project_id)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.project)
    }

    async fn fetch_all_users(&self) -> Result<Vec<Participant>> {
        let response: UsersResponse = self
            .client
            .get(self.url("/users/all"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.users)
    }

    async fn create_project(&self, name: &str) -> Result<ProjectSnapshot> {
        let response: ProjectResponse = self
            .client
            .post(self.url("/projects/create"))
            .json(&json!({ "name": name }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.project)
    }

    async fn add_collaborators(&self, project_id: &str, user_ids: &[String]) -> Result<()> {
        self.client
            .put(self.url("/projects/add-user"))
            .json(&json!({ "projectId": project_id, "users": user_ids }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn save_file_tree(&self, project_id: &str, tree: &FileTree) -> Result<()> {
        self.client
            .put(self.url("/projects/update-file-tree"))
            .json(&json!({ "projectId": project_id, "fileTree": tree }))
            .send()
            .await
            .map_err(|e| CodevError::persistence(e.to_string()))?
            .error_for_status()
            .map_err(|e| CodevError::persistence(e.to_string()))?;
        Ok(())
    }
}

//! Portainer API client
//!
//! Thin, typed wrapper around the Portainer HTTP API. Each operation issues
//! exactly one request through a reusable session authenticated with the
//! instance's `X-API-Key` header. No retries, no pooling beyond the one
//! `reqwest::Client` per instance.

use crate::error::{PortainerError, Result};
use crate::model::{
    Environment, GitRedeployRequest, Image, RefreshOutcome, Stack, StackUpdateRequest,
};
use async_trait::async_trait;
use serde::Deserialize;

/// Fallback when an environment does not report its Docker API version.
const DEFAULT_DOCKER_API_VERSION: &str = "1.41";

/// The operations the reconciliation engine drives against one instance.
///
/// Kept behind a trait so the engine can be exercised against a mock
/// without a live Portainer.
#[async_trait]
pub trait PortainerApi: Send + Sync {
    /// Reachability check against the instance root.
    async fn ping(&self) -> Result<()>;

    /// Docker API version of an environment, used to build image URLs.
    async fn docker_api_version(&self, environment_id: i64) -> Result<String>;

    /// Whether the instance itself has an update available.
    async fn update_available(&self) -> Result<bool>;

    /// Apply the instance self-update. Returns true when the update is no
    /// longer reported as available afterwards.
    async fn apply_update(&self) -> Result<bool>;

    async fn environments(&self) -> Result<Vec<Environment>>;

    /// Stacks deployed in an environment, excluding orphaned ones.
    async fn stacks(&self, environment_id: i64) -> Result<Vec<Stack>>;

    /// Ask the instance to drop cached image freshness state for an
    /// environment so the next refresh recomputes it.
    async fn clear_image_status(&self, environment_id: i64) -> Result<()>;

    /// Recompute image freshness for a stack.
    async fn refresh_stack_images(&self, stack_id: i64) -> Result<RefreshOutcome>;

    /// Current compose file content of a stack.
    async fn stack_file_content(&self, stack_id: i64) -> Result<String>;

    /// Content-based stack update.
    async fn update_stack(
        &self,
        stack_id: i64,
        environment_id: i64,
        request: StackUpdateRequest,
    ) -> Result<serde_json::Value>;

    /// Git-based stack redeploy.
    async fn redeploy_stack_git(
        &self,
        stack_id: i64,
        environment_id: i64,
        request: GitRedeployRequest,
    ) -> Result<serde_json::Value>;

    /// Images of an environment annotated with their usage flag.
    async fn images_with_usage(&self, environment_id: i64) -> Result<Vec<Image>>;

    async fn delete_image(
        &self,
        environment_id: i64,
        api_version: &str,
        image_id: &str,
    ) -> Result<()>;
}

/// Portainer API client bound to one instance.
pub struct Portainer {
    client: reqwest::Client,
    base_url: String,
}

impl Portainer {
    /// Build a client for one instance. The access token travels as the
    /// `X-API-Key` default header on every request.
    pub fn new(host: &str, access_token: &str, verify_ssl: bool) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut token = reqwest::header::HeaderValue::from_str(access_token)
            .map_err(|_| PortainerError::InvalidAccessToken)?;
        token.set_sensitive(true);
        headers.insert("X-API-Key", token);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(|source| PortainerError::Http {
                context: "failed to build HTTP client".to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: host.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, mapping transport failures and non-2xx statuses to
    /// `PortainerError`.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<reqwest::Response> {
        tracing::debug!(context, "portainer request");

        let response = request
            .send()
            .await
            .map_err(|source| PortainerError::Http {
                context: context.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortainerError::Status {
                context: context.to_string(),
                status,
            });
        }

        Ok(response)
    }

    /// Send a request and decode its JSON body.
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = self.send(request, context).await?;
        response
            .json()
            .await
            .map_err(|source| PortainerError::InvalidResponse {
                context: context.to_string(),
                source,
            })
    }
}

#[derive(Deserialize)]
struct SystemVersionResponse {
    #[serde(rename = "UpdateAvailable", default)]
    update_available: bool,
}

#[derive(Deserialize)]
struct DockerVersionResponse {
    #[serde(rename = "ApiVersion", default)]
    api_version: Option<String>,
}

#[derive(Deserialize)]
struct ImageStatusResponse {
    #[serde(rename = "Status", default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct StackFileResponse {
    #[serde(rename = "StackFileContent", default)]
    stack_file_content: String,
}

#[async_trait]
impl PortainerApi for Portainer {
    async fn ping(&self) -> Result<()> {
        let request = self.client.get(&self.base_url);
        self.send(request, "failed to reach Portainer").await?;
        Ok(())
    }

    async fn docker_api_version(&self, environment_id: i64) -> Result<String> {
        let request = self
            .client
            .get(self.url(&format!("/api/endpoints/{environment_id}/docker/version")));
        let body: DockerVersionResponse = self
            .send_json(
                request,
                &format!("failed to get Docker API version for environment {environment_id}"),
            )
            .await?;
        Ok(body
            .api_version
            .unwrap_or_else(|| DEFAULT_DOCKER_API_VERSION.to_string()))
    }

    async fn update_available(&self) -> Result<bool> {
        let request = self.client.get(self.url("/api/system/version"));
        let body: SystemVersionResponse = self
            .send_json(request, "failed to get Portainer version")
            .await?;
        Ok(body.update_available)
    }

    async fn apply_update(&self) -> Result<bool> {
        let request = self.client.post(self.url("/api/system/update"));
        let body: SystemVersionResponse =
            self.send_json(request, "failed to update Portainer").await?;
        Ok(!body.update_available)
    }

    async fn environments(&self) -> Result<Vec<Environment>> {
        let request = self.client.get(self.url("/api/endpoints"));
        self.send_json(request, "failed to list environments").await
    }

    async fn stacks(&self, environment_id: i64) -> Result<Vec<Stack>> {
        let filters = serde_json::json!({
            "EndpointID": environment_id,
            "IncludeOrphanedStacks": false,
        })
        .to_string();

        let request = self
            .client
            .get(self.url("/api/stacks"))
            .query(&[("filters", filters.as_str())]);
        self.send_json(
            request,
            &format!("failed to list stacks for environment {environment_id}"),
        )
        .await
    }

    async fn clear_image_status(&self, environment_id: i64) -> Result<()> {
        let request = self
            .client
            .post(self.url("/api/stacks/image_status/clear"))
            .query(&[("environmentId", environment_id)]);
        self.send(
            request,
            &format!("failed to clear image status for environment {environment_id}"),
        )
        .await?;
        Ok(())
    }

    async fn refresh_stack_images(&self, stack_id: i64) -> Result<RefreshOutcome> {
        let request = self
            .client
            .post(self.url(&format!("/api/stacks/{stack_id}/images_status")))
            .query(&[("refresh", "true")]);
        let body: ImageStatusResponse = self
            .send_json(
                request,
                &format!("failed to refresh images for stack {stack_id}"),
            )
            .await?;
        // Portainer omits the field when everything is current.
        Ok(RefreshOutcome::from_status(
            body.status.as_deref().unwrap_or("updated"),
        ))
    }

    async fn stack_file_content(&self, stack_id: i64) -> Result<String> {
        let request = self
            .client
            .get(self.url(&format!("/api/stacks/{stack_id}/file")));
        let body: StackFileResponse = self
            .send_json(
                request,
                &format!("failed to get file content for stack {stack_id}"),
            )
            .await?;
        Ok(body.stack_file_content)
    }

    async fn update_stack(
        &self,
        stack_id: i64,
        environment_id: i64,
        request: StackUpdateRequest,
    ) -> Result<serde_json::Value> {
        let request = self
            .client
            .put(self.url(&format!("/api/stacks/{stack_id}")))
            .query(&[("endpointId", environment_id)])
            .json(&request);
        self.send_json(
            request,
            &format!("failed to update stack {stack_id} in environment {environment_id}"),
        )
        .await
    }

    async fn redeploy_stack_git(
        &self,
        stack_id: i64,
        environment_id: i64,
        request: GitRedeployRequest,
    ) -> Result<serde_json::Value> {
        let request = self
            .client
            .put(self.url(&format!("/api/stacks/{stack_id}/git/redeploy")))
            .query(&[("endpointId", environment_id)])
            .json(&request);
        self.send_json(
            request,
            &format!(
                "failed to redeploy stack {stack_id} in environment {environment_id} from git"
            ),
        )
        .await
    }

    async fn images_with_usage(&self, environment_id: i64) -> Result<Vec<Image>> {
        let request = self
            .client
            .get(self.url(&format!("/api/docker/{environment_id}/images")))
            .query(&[("withUsage", "true")]);
        self.send_json(
            request,
            &format!("failed to list images for environment {environment_id}"),
        )
        .await
    }

    async fn delete_image(
        &self,
        environment_id: i64,
        api_version: &str,
        image_id: &str,
    ) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!(
                "/api/endpoints/{environment_id}/docker/v{api_version}/images/{image_id}"
            )))
            .query(&[("force", "false")]);
        self.send(
            request,
            &format!("failed to delete image {image_id} from environment {environment_id}"),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = Portainer::new("https://portainer.example.com/", "token", true).unwrap();
        assert_eq!(client.url("/api/endpoints"), "https://portainer.example.com/api/endpoints");
    }

    #[test]
    fn test_invalid_access_token_rejected() {
        assert!(Portainer::new("https://portainer.example.com", "bad\ntoken", true).is_err());
    }
}

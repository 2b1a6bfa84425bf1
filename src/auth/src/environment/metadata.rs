// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::Result;
use crate::errors::Error;
use reqwest::{Client as ReqwestClient, RequestBuilder};

const METADATA_PATH: &str = "/metadata/endpoints";
const METADATA_API_VERSION: &str = "1.0";

/// A client for the metadata endpoints exposed by a resource manager.
///
/// Azure Stack and other custom deployments publish their login endpoint and
/// token audiences at `{resource_manager_endpoint}/metadata/endpoints`.
#[derive(Clone, Debug, Default)]
pub(crate) struct Client {
    inner: ReqwestClient,
}

/// The subset of the metadata document used to build an environment.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct EnvironmentMetadata {
    pub(crate) gallery_endpoint: String,
    pub(crate) graph_endpoint: String,
    pub(crate) portal_endpoint: String,
    pub(crate) authentication: Authentication,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Authentication {
    pub(crate) login_endpoint: String,
    pub(crate) audiences: Vec<String>,
}

impl Client {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn get(&self, resource_manager_endpoint: &str) -> RequestBuilder {
        let url = format!(
            "{}{METADATA_PATH}",
            resource_manager_endpoint.trim_end_matches('/')
        );
        self.inner
            .get(url)
            .query(&[("api-version", METADATA_API_VERSION)])
    }

    /// Fetches the environment metadata published by `resource_manager_endpoint`.
    pub(crate) async fn environment_metadata(
        &self,
        resource_manager_endpoint: &str,
    ) -> Result<EnvironmentMetadata> {
        let response = self
            .get(resource_manager_endpoint)
            .send()
            .await
            .map_err(Error::metadata)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(Error::metadata)?;
            return Err(Error::metadata(format!(
                "failed to fetch environment metadata from {resource_manager_endpoint}, status: {status}, body: {body}"
            )));
        }

        let metadata = response
            .json::<EnvironmentMetadata>()
            .await
            .map_err(Error::metadata)?;
        if metadata.authentication.audiences.is_empty() {
            return Err(Error::metadata(format!(
                "the metadata from {resource_manager_endpoint} does not list any token audiences"
            )));
        }
        Ok(metadata)
    }
}

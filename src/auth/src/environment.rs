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

//! Azure [cloud environments].
//!
//! Each sovereign or regional Azure deployment uses its own set of endpoints:
//! the authority that issues tokens, the audience those tokens are scoped to,
//! the resource manager, and so on. An [Environment] groups these endpoints.
//!
//! The well-known clouds are built into the crate and looked up by name.
//! Custom deployments, such as Azure Stack, publish their endpoints from the
//! resource manager, and [resolve] fetches them when given such an endpoint.
//!
//! Example usage:
//!
//! ```
//! # use azure_cloud_auth::environment::{self, Environment};
//! # tokio_test::block_on(async {
//! let env = environment::resolve("AzureChinaCloud", "", "").await?;
//! assert_eq!(&env, Environment::china_cloud());
//! # Ok::<(), azure_cloud_auth::errors::Error>(())
//! # });
//! ```
//!
//! [cloud environments]: https://learn.microsoft.com/en-us/azure/active-directory/develop/authentication-national-cloud

pub(crate) mod metadata;

use crate::Result;
use crate::config::{MAX_CONFIG_SIZE, check_size, read_bounded};
use crate::errors::Error;
use metadata::EnvironmentMetadata;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

/// The name of the Azure public cloud.
pub const PUBLIC_CLOUD_NAME: &str = "AzurePublicCloud";
/// The name of the Azure China cloud.
pub const CHINA_CLOUD_NAME: &str = "AzureChinaCloud";
/// The name of the Azure German cloud.
pub const GERMAN_CLOUD_NAME: &str = "AzureGermanCloud";
/// The name of the Azure US Government cloud.
pub const US_GOVERNMENT_CLOUD_NAME: &str = "AzureUSGovernmentCloud";
/// The name of a custom cloud, defined by the file in [ENVIRONMENT_FILEPATH_VAR].
pub const STACK_CLOUD_NAME: &str = "AzureStackCloud";

/// The environment variable naming the JSON definition of [STACK_CLOUD_NAME].
pub const ENVIRONMENT_FILEPATH_VAR: &str = "AZURE_ENVIRONMENT_FILEPATH";

const HYBRID_ENVIRONMENT_NAME: &str = "HybridEnvironment";
const ADFS_IDENTITY_SYSTEM: &str = "adfs";

/// The identity system issuing tokens in an environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IdentitySystem {
    /// Azure Active Directory (Microsoft Entra ID).
    #[default]
    AzureAd,
    /// Active Directory Federation Services, used by on-premises deployments.
    Adfs,
}

impl IdentitySystem {
    /// Interprets the `identitySystem` configuration value.
    ///
    /// Only `adfs` (in any case) selects [IdentitySystem::Adfs]; any other
    /// value, including the empty string, selects the standard system.
    pub fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case(ADFS_IDENTITY_SYSTEM) {
            Self::Adfs
        } else {
            Self::AzureAd
        }
    }
}

/// The endpoints of an Azure cloud deployment.
///
/// The serialized form uses the field names of the environment files
/// consumed via [ENVIRONMENT_FILEPATH_VAR].
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Environment {
    /// The name of the environment, e.g. `AzurePublicCloud`.
    pub name: String,
    #[serde(rename = "managementPortalURL")]
    pub management_portal_url: String,
    #[serde(rename = "publishSettingsURL")]
    pub publish_settings_url: String,
    /// The resource, or audience, for tokens used with the management APIs.
    pub service_management_endpoint: String,
    pub resource_manager_endpoint: String,
    /// The base URL of the authority issuing tokens.
    pub active_directory_endpoint: String,
    pub gallery_endpoint: String,
    pub key_vault_endpoint: String,
    pub graph_endpoint: String,
    pub storage_endpoint_suffix: String,
    #[serde(rename = "keyVaultDNSSuffix")]
    pub key_vault_dns_suffix: String,
    #[serde(rename = "resourceManagerVMDNSSuffix")]
    pub resource_manager_vm_dns_suffix: String,
    pub token_audience: String,
    /// The identity system, this is not part of the environment files.
    #[serde(skip)]
    pub identity_system: IdentitySystem,
}

static PUBLIC_CLOUD: LazyLock<Environment> = LazyLock::new(|| Environment {
    name: PUBLIC_CLOUD_NAME.to_string(),
    management_portal_url: "https://manage.windowsazure.com/".to_string(),
    publish_settings_url: "https://manage.windowsazure.com/publishsettings/index".to_string(),
    service_management_endpoint: "https://management.core.windows.net/".to_string(),
    resource_manager_endpoint: "https://management.azure.com/".to_string(),
    active_directory_endpoint: "https://login.microsoftonline.com/".to_string(),
    gallery_endpoint: "https://gallery.azure.com/".to_string(),
    key_vault_endpoint: "https://vault.azure.net/".to_string(),
    graph_endpoint: "https://graph.windows.net/".to_string(),
    storage_endpoint_suffix: "core.windows.net".to_string(),
    key_vault_dns_suffix: "vault.azure.net".to_string(),
    resource_manager_vm_dns_suffix: "cloudapp.azure.com".to_string(),
    token_audience: "https://management.azure.com/".to_string(),
    identity_system: IdentitySystem::AzureAd,
});

static CHINA_CLOUD: LazyLock<Environment> = LazyLock::new(|| Environment {
    name: CHINA_CLOUD_NAME.to_string(),
    management_portal_url: "https://manage.chinacloudapi.com/".to_string(),
    publish_settings_url: "https://manage.chinacloudapi.com/publishsettings/index".to_string(),
    service_management_endpoint: "https://management.core.chinacloudapi.cn/".to_string(),
    resource_manager_endpoint: "https://management.chinacloudapi.cn/".to_string(),
    active_directory_endpoint: "https://login.chinacloudapi.cn/".to_string(),
    gallery_endpoint: "https://gallery.chinacloudapi.cn/".to_string(),
    key_vault_endpoint: "https://vault.azure.cn/".to_string(),
    graph_endpoint: "https://graph.chinacloudapi.cn/".to_string(),
    storage_endpoint_suffix: "core.chinacloudapi.cn".to_string(),
    key_vault_dns_suffix: "vault.azure.cn".to_string(),
    resource_manager_vm_dns_suffix: "cloudapp.chinacloudapi.cn".to_string(),
    token_audience: "https://management.chinacloudapi.cn/".to_string(),
    identity_system: IdentitySystem::AzureAd,
});

static GERMAN_CLOUD: LazyLock<Environment> = LazyLock::new(|| Environment {
    name: GERMAN_CLOUD_NAME.to_string(),
    management_portal_url: "http://portal.microsoftazure.de/".to_string(),
    publish_settings_url: "https://manage.microsoftazure.de/publishsettings/index".to_string(),
    service_management_endpoint: "https://management.core.cloudapi.de/".to_string(),
    resource_manager_endpoint: "https://management.microsoftazure.de/".to_string(),
    active_directory_endpoint: "https://login.microsoftonline.de/".to_string(),
    gallery_endpoint: "https://gallery.cloudapi.de/".to_string(),
    key_vault_endpoint: "https://vault.microsoftazure.de/".to_string(),
    graph_endpoint: "https://graph.cloudapi.de/".to_string(),
    storage_endpoint_suffix: "core.cloudapi.de".to_string(),
    key_vault_dns_suffix: "vault.microsoftazure.de".to_string(),
    resource_manager_vm_dns_suffix: "cloudapp.microsoftazure.de".to_string(),
    token_audience: "https://management.microsoftazure.de/".to_string(),
    identity_system: IdentitySystem::AzureAd,
});

static US_GOVERNMENT_CLOUD: LazyLock<Environment> = LazyLock::new(|| Environment {
    name: US_GOVERNMENT_CLOUD_NAME.to_string(),
    management_portal_url: "https://manage.windowsazure.us/".to_string(),
    publish_settings_url: "https://manage.windowsazure.us/publishsettings/index".to_string(),
    service_management_endpoint: "https://management.core.usgovcloudapi.net/".to_string(),
    resource_manager_endpoint: "https://management.usgovcloudapi.net/".to_string(),
    active_directory_endpoint: "https://login.microsoftonline.us/".to_string(),
    gallery_endpoint: "https://gallery.usgovcloudapi.net/".to_string(),
    key_vault_endpoint: "https://vault.usgovcloudapi.net/".to_string(),
    graph_endpoint: "https://graph.windows.net/".to_string(),
    storage_endpoint_suffix: "core.usgovcloudapi.net".to_string(),
    key_vault_dns_suffix: "vault.usgovcloudapi.net".to_string(),
    resource_manager_vm_dns_suffix: "cloudapp.usgovcloudapi.net".to_string(),
    token_audience: "https://management.usgovcloudapi.net/".to_string(),
    identity_system: IdentitySystem::AzureAd,
});

// Keyed by the upper-case name, lookups upper-case their input.
static BUILT_IN: LazyLock<HashMap<String, &'static Environment>> = LazyLock::new(|| {
    [
        &*PUBLIC_CLOUD,
        &*CHINA_CLOUD,
        &*GERMAN_CLOUD,
        &*US_GOVERNMENT_CLOUD,
    ]
    .into_iter()
    .map(|env| (env.name.to_ascii_uppercase(), env))
    .collect()
});

impl Environment {
    /// The Azure public cloud.
    pub fn public_cloud() -> &'static Environment {
        &PUBLIC_CLOUD
    }

    /// The Azure China cloud.
    pub fn china_cloud() -> &'static Environment {
        &CHINA_CLOUD
    }

    /// The Azure German cloud.
    pub fn german_cloud() -> &'static Environment {
        &GERMAN_CLOUD
    }

    /// The Azure US Government cloud.
    pub fn us_government_cloud() -> &'static Environment {
        &US_GOVERNMENT_CLOUD
    }

    /// Looks up an environment by name, ignoring case.
    ///
    /// The built-in environments require no I/O. [STACK_CLOUD_NAME] reads the
    /// environment definition from the file named by
    /// [ENVIRONMENT_FILEPATH_VAR].
    pub fn from_name(name: &str) -> Result<Environment> {
        if name.eq_ignore_ascii_case(STACK_CLOUD_NAME) {
            return Self::from_file(stack_environment_path()?);
        }
        Self::built_in(name)
    }

    fn built_in(name: &str) -> Result<Environment> {
        BUILT_IN
            .get(&name.to_ascii_uppercase())
            .map(|env| (*env).clone())
            .ok_or_else(|| Error::unknown_cloud_name(name))
    }

    /// Reads an environment definition from a JSON file.
    ///
    /// This function blocks, [resolve] reads the file asynchronously. Files
    /// larger than [MAX_CONFIG_SIZE] are rejected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Environment> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            Error::loading(format!("cannot open environment file {}: {e}", path.display()))
        })?;
        let mut contents = Vec::new();
        file.take(MAX_CONFIG_SIZE + 1)
            .read_to_end(&mut contents)
            .map_err(|e| {
                Error::loading(format!("cannot read environment file {}: {e}", path.display()))
            })?;
        check_size(path, &contents)?;
        Self::parse_file(path, &contents)
    }

    async fn from_file_async(path: &Path) -> Result<Environment> {
        let contents = read_bounded(path).await?;
        Self::parse_file(path, &contents)
    }

    fn parse_file(path: &Path, contents: &[u8]) -> Result<Environment> {
        serde_json::from_slice::<Environment>(contents).map_err(|e| {
            Error::parsing(format!("cannot parse environment file {}: {e}", path.display()))
        })
    }

    /// Builds the environment of a custom deployment from its published metadata.
    fn from_metadata(
        resource_manager_endpoint: &str,
        metadata: EnvironmentMetadata,
        name_override: &str,
        identity_system: IdentitySystem,
    ) -> Result<Environment> {
        let url = url::Url::parse(resource_manager_endpoint).map_err(Error::invalid_config)?;
        let host = url.host_str().unwrap_or_default();
        let domain = host.strip_prefix("management.").unwrap_or(host);

        let name = if name_override.is_empty() {
            HYBRID_ENVIRONMENT_NAME
        } else {
            name_override
        };
        let token_audience = metadata
            .authentication
            .audiences
            .into_iter()
            .next()
            .ok_or_else(|| Error::metadata("the environment metadata has no token audiences"))?;

        let mut active_directory_endpoint = metadata.authentication.login_endpoint;
        if identity_system == IdentitySystem::Adfs {
            let trimmed = active_directory_endpoint.trim_end_matches('/');
            let trimmed = trimmed.strip_suffix(ADFS_IDENTITY_SYSTEM).unwrap_or(trimmed);
            active_directory_endpoint = trimmed.to_string();
        }

        Ok(Environment {
            name: name.to_string(),
            management_portal_url: resource_manager_endpoint
                .replace("https://management.", "https://portal."),
            publish_settings_url: String::new(),
            service_management_endpoint: token_audience.clone(),
            resource_manager_endpoint: resource_manager_endpoint.to_string(),
            active_directory_endpoint,
            gallery_endpoint: metadata.gallery_endpoint,
            key_vault_endpoint: format!("https://vault.{domain}/"),
            graph_endpoint: metadata.graph_endpoint,
            storage_endpoint_suffix: domain.to_string(),
            key_vault_dns_suffix: format!("vault.{domain}"),
            resource_manager_vm_dns_suffix: resource_manager_endpoint
                .replace("https://management.", "cloudapp.")
                .trim_end_matches('/')
                .to_string(),
            token_audience,
            identity_system,
        })
    }
}

/// Resolves the environment for a cloud name or a custom resource manager.
///
/// * A non-empty `resource_manager_endpoint` takes precedence. The
///   environment is built from the metadata the endpoint publishes, named
///   `cloud_name` when that is not empty. If `identity_system` is `adfs` the
///   authority is adjusted for ADFS.
/// * Otherwise an empty `cloud_name` returns the public cloud.
/// * Otherwise `cloud_name` is looked up with [Environment::from_name].
///
/// Only the first case performs network I/O.
pub async fn resolve(
    cloud_name: &str,
    resource_manager_endpoint: &str,
    identity_system: &str,
) -> Result<Environment> {
    resolve_with_client(
        &metadata::Client::new(),
        cloud_name,
        resource_manager_endpoint,
        identity_system,
    )
    .await
}

pub(crate) async fn resolve_with_client(
    client: &metadata::Client,
    cloud_name: &str,
    resource_manager_endpoint: &str,
    identity_system: &str,
) -> Result<Environment> {
    if !resource_manager_endpoint.is_empty() {
        tracing::debug!(
            resource_manager_endpoint,
            "loading environment from the resource manager metadata"
        );
        let metadata = client.environment_metadata(resource_manager_endpoint).await?;
        return Environment::from_metadata(
            resource_manager_endpoint,
            metadata,
            cloud_name,
            IdentitySystem::from_config(identity_system),
        );
    }
    if cloud_name.is_empty() {
        tracing::debug!("no cloud name configured, using {PUBLIC_CLOUD_NAME}");
        return Ok(Environment::public_cloud().clone());
    }
    if cloud_name.eq_ignore_ascii_case(STACK_CLOUD_NAME) {
        let path = stack_environment_path()?;
        tracing::debug!(path = %path, "loading environment from file");
        return Environment::from_file_async(Path::new(&path)).await;
    }
    tracing::debug!(cloud_name, "loading built-in environment");
    Environment::built_in(cloud_name)
}

fn stack_environment_path() -> Result<String> {
    std::env::var(ENVIRONMENT_FILEPATH_VAR).map_err(|e| {
        Error::loading(format!(
            "{STACK_CLOUD_NAME} requires the {ENVIRONMENT_FILEPATH_VAR} environment variable: {e}"
        ))
    })
}

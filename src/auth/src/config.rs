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

//! The authentication section of an Azure cloud configuration.
//!
//! Cloud configuration files (often named `azure.json`) carry the credentials
//! and the cloud used by the workload. [load] reads such a file and resolves
//! its cloud environment.

use crate::Result;
use crate::environment::{self, Environment, IdentitySystem};
use crate::errors::Error;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Larger configuration files are rejected.
pub const MAX_CONFIG_SIZE: u64 = 10 * 1024 * 1024;

/// The authentication configuration.
///
/// Empty strings mean "not set". The serialized form uses the field names of
/// the cloud configuration file.
#[derive(Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// The cloud environment name, e.g. `AzurePublicCloud`.
    pub cloud: String,
    /// The identity system, `adfs` for ADFS and empty for Azure AD.
    #[serde(rename = "identitySystem")]
    pub identity_system: String,
    /// The resource manager endpoint of a custom cloud, e.g. Azure Stack.
    #[serde(rename = "resourceManagerEndpoint")]
    pub resource_manager_endpoint: String,
    /// The AAD tenant ID.
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    /// The client ID of the service principal.
    #[serde(rename = "aadClientId")]
    pub aad_client_id: String,
    /// The client secret of the service principal.
    #[serde(rename = "aadClientSecret")]
    pub aad_client_secret: String,
    /// The path to a PEM file with the service principal certificate and key.
    #[serde(rename = "aadClientCertPath")]
    pub aad_client_cert_path: String,
    /// Use the managed identity of the host instead of a service principal.
    #[serde(rename = "useManagedIdentityExtension")]
    pub use_managed_identity_extension: bool,
    /// The client ID of a user-assigned identity, empty for the system-assigned identity.
    #[serde(rename = "userAssignedIdentityID")]
    pub user_assigned_identity_id: String,
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
    /// The tenant of the network resources, when different from `tenant_id`.
    #[serde(rename = "networkResourceTenantID")]
    pub network_resource_tenant_id: String,
    #[serde(rename = "networkResourceSubscriptionID")]
    pub network_resource_subscription_id: String,
}

impl AuthConfig {
    /// Parses the JSON cloud configuration.
    pub fn from_json(contents: &[u8]) -> Result<Self> {
        serde_json::from_slice(contents).map_err(Error::parsing)
    }

    /// The identity system named by [AuthConfig::identity_system].
    pub fn identity_system(&self) -> IdentitySystem {
        IdentitySystem::from_config(&self.identity_system)
    }

    /// Returns true if the network resources live in a different tenant.
    pub fn uses_network_resource_in_different_tenant(&self) -> bool {
        !self.network_resource_tenant_id.is_empty()
            && !self
                .network_resource_tenant_id
                .eq_ignore_ascii_case(&self.tenant_id)
    }

    /// Resolves the cloud environment named by this configuration.
    pub async fn environment(&self) -> Result<Environment> {
        environment::resolve(
            &self.cloud,
            &self.resource_manager_endpoint,
            &self.identity_system,
        )
        .await
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("cloud", &self.cloud)
            .field("identity_system", &self.identity_system)
            .field("resource_manager_endpoint", &self.resource_manager_endpoint)
            .field("tenant_id", &self.tenant_id)
            .field("aad_client_id", &self.aad_client_id)
            .field("aad_client_secret", &"[censored]")
            .field("aad_client_cert_path", &self.aad_client_cert_path)
            .field(
                "use_managed_identity_extension",
                &self.use_managed_identity_extension,
            )
            .field("user_assigned_identity_id", &self.user_assigned_identity_id)
            .field("subscription_id", &self.subscription_id)
            .field(
                "network_resource_tenant_id",
                &self.network_resource_tenant_id,
            )
            .field(
                "network_resource_subscription_id",
                &self.network_resource_subscription_id,
            )
            .finish()
    }
}

/// Reads the configuration file at `path` and resolves its environment.
///
/// Files larger than [MAX_CONFIG_SIZE] are rejected.
pub async fn load<P: AsRef<Path>>(path: P) -> Result<(AuthConfig, Environment)> {
    let path = path.as_ref();
    let contents = read_bounded(path).await?;
    let config = AuthConfig::from_json(&contents)?;
    tracing::debug!(path = %path.display(), cloud = %config.cloud, "loaded cloud config");
    let env = config.environment().await?;
    Ok((config, env))
}

/// Reads at most [MAX_CONFIG_SIZE] bytes from `path`.
pub(crate) async fn read_bounded(path: &Path) -> Result<Vec<u8>> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::loading(format!("cannot open {}: {e}", path.display())))?;
    let mut contents = Vec::new();
    file.take(MAX_CONFIG_SIZE + 1)
        .read_to_end(&mut contents)
        .await
        .map_err(|e| Error::loading(format!("cannot read {}: {e}", path.display())))?;
    check_size(path, &contents)?;
    Ok(contents)
}

pub(crate) fn check_size(path: &Path, contents: &[u8]) -> Result<()> {
    if contents.len() as u64 > MAX_CONFIG_SIZE {
        return Err(Error::too_large(format!(
            "{} exceeds the {MAX_CONFIG_SIZE} byte limit",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn from_json() -> TestResult {
        let contents = json!({
            "cloud": "AzureChinaCloud",
            "tenantId": "test-tenant",
            "aadClientId": "test-client",
            "aadClientSecret": "test-secret",
            "aadClientCertPath": "/etc/kubernetes/cert.pem",
            "useManagedIdentityExtension": true,
            "userAssignedIdentityID": "test-identity",
            "subscriptionId": "test-subscription",
            "identitySystem": "adfs",
            "resourceManagerEndpoint": "https://management.local.azurestack.external/",
            "networkResourceTenantID": "test-network-tenant",
            "networkResourceSubscriptionID": "test-network-subscription",
            "unknownField": "ignored"
        })
        .to_string();
        let got = AuthConfig::from_json(contents.as_bytes())?;
        let want = AuthConfig {
            cloud: "AzureChinaCloud".to_string(),
            identity_system: "adfs".to_string(),
            resource_manager_endpoint: "https://management.local.azurestack.external/".to_string(),
            tenant_id: "test-tenant".to_string(),
            aad_client_id: "test-client".to_string(),
            aad_client_secret: "test-secret".to_string(),
            aad_client_cert_path: "/etc/kubernetes/cert.pem".to_string(),
            use_managed_identity_extension: true,
            user_assigned_identity_id: "test-identity".to_string(),
            subscription_id: "test-subscription".to_string(),
            network_resource_tenant_id: "test-network-tenant".to_string(),
            network_resource_subscription_id: "test-network-subscription".to_string(),
        };
        assert_eq!(got, want);
        assert_eq!(got.identity_system(), IdentitySystem::Adfs);
        Ok(())
    }

    #[test]
    fn from_json_defaults() -> TestResult {
        let got = AuthConfig::from_json(b"{}")?;
        assert_eq!(got, AuthConfig::default());
        assert_eq!(got.identity_system(), IdentitySystem::AzureAd);
        Ok(())
    }

    #[test]
    fn from_json_malformed() {
        let err =
            AuthConfig::from_json(br#"{"useManagedIdentityExtension": "yes"}"#).unwrap_err();
        assert!(err.is_parsing(), "{err:?}");
    }

    #[test]
    fn debug() {
        let config = AuthConfig {
            tenant_id: "test-tenant".to_string(),
            aad_client_secret: "super-duper-secret".to_string(),
            ..Default::default()
        };
        let got = format!("{config:?}");
        assert!(got.contains("test-tenant"), "{got}");
        assert!(!got.contains("super-duper-secret"), "{got}");
        assert!(got.contains("[censored]"), "{got}");
    }

    #[test_case("", "tenant", false; "no network tenant")]
    #[test_case("tenant", "tenant", false; "same tenant")]
    #[test_case("TENANT", "tenant", false; "same tenant ignoring case")]
    #[test_case("network", "tenant", true; "different tenant")]
    fn network_resource_tenant(network: &str, tenant: &str, want: bool) {
        let config = AuthConfig {
            tenant_id: tenant.to_string(),
            network_resource_tenant_id: network.to_string(),
            ..Default::default()
        };
        assert_eq!(config.uses_network_resource_in_different_tenant(), want);
    }

    #[tokio::test]
    async fn load_success() -> TestResult {
        let file = tempfile::NamedTempFile::new()?;
        let path = file.into_temp_path();
        std::fs::write(
            &path,
            json!({
                "cloud": "AZUREUSGOVERNMENTCLOUD",
                "tenantId": "test-tenant",
                "aadClientId": "test-client",
                "aadClientSecret": "test-secret"
            })
            .to_string(),
        )?;

        let (config, env) = load(&path).await?;
        assert_eq!(config.tenant_id, "test-tenant");
        assert_eq!(&env, Environment::us_government_cloud());
        Ok(())
    }

    #[tokio::test]
    async fn load_unknown_cloud() -> TestResult {
        let file = tempfile::NamedTempFile::new()?;
        let path = file.into_temp_path();
        std::fs::write(&path, json!({"cloud": "not-a-real-cloud"}).to_string())?;

        let err = load(&path).await.unwrap_err();
        assert!(err.is_unknown_cloud_name(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn load_missing_file() {
        let err = load("file-does-not-exist.json").await.unwrap_err();
        assert!(err.is_loading(), "{err:?}");
        assert!(err.to_string().contains("file-does-not-exist.json"), "{err}");
    }

    #[tokio::test]
    async fn load_too_large() -> TestResult {
        let file = tempfile::NamedTempFile::new()?;
        let path = file.into_temp_path();
        let padding = " ".repeat(MAX_CONFIG_SIZE as usize);
        std::fs::write(&path, format!("{{}}{padding}"))?;

        let err = load(&path).await.unwrap_err();
        assert!(err.is_too_large(), "{err:?}");
        assert!(!err.is_loading(), "{err:?}");
        assert!(err.to_string().contains("limit"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn load_malformed() -> TestResult {
        let file = tempfile::NamedTempFile::new()?;
        let path = file.into_temp_path();
        std::fs::write(&path, "{not json")?;

        let err = load(&path).await.unwrap_err();
        assert!(err.is_parsing(), "{err:?}");
        assert!(!err.is_loading(), "{err:?}");
        assert!(!err.is_too_large(), "{err:?}");
        Ok(())
    }
}

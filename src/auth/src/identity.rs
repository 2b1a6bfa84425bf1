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

//! The identity provider used to construct credentials.
//!
//! The credential selector decides *which* credential to create, the
//! [IdentityProvider] knows *how* to create it: where the managed identity
//! endpoint lives, how an OAuth authority is laid out, and what each kind of
//! token request needs. Token exchange, caching and refresh happen later,
//! against the [CredentialHandle] values created here.
//!
//! [AzureAdProvider] is the default implementation. Applications may supply
//! their own implementation, for example in tests.

mod oauth;

pub use oauth::{MultiTenantOAuthConfig, OAuthConfig};

use crate::credentials::{ClientCertificate, CredentialHandle, Grant, MultiTenantCredentialHandle};
use url::Url;

/// The errors returned by an [IdentityProvider].
///
/// The credential selector returns these errors to the caller unmodified.
pub type DelegateError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A `Result` alias where the `Err` case is [DelegateError].
pub type DelegateResult<T> = std::result::Result<T, DelegateError>;

/// The managed identity endpoint on Azure virtual machines.
pub const MSI_VM_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Constructs the credentials chosen by the selector.
pub trait IdentityProvider: std::fmt::Debug + Send + Sync {
    /// Discovers the managed identity endpoint.
    fn msi_endpoint(&self) -> DelegateResult<String>;

    /// Builds the authority configuration for `tenant_id`.
    fn oauth_config(
        &self,
        active_directory_endpoint: &str,
        tenant_id: &str,
    ) -> DelegateResult<OAuthConfig>;

    /// Builds the authority configuration for a primary and auxiliary tenants.
    fn multi_tenant_oauth_config(
        &self,
        active_directory_endpoint: &str,
        primary_tenant_id: &str,
        auxiliary_tenant_ids: &[String],
    ) -> DelegateResult<MultiTenantOAuthConfig>;

    /// Requests tokens for `resource` from the system-assigned identity.
    fn token_from_msi(&self, msi_endpoint: &str, resource: &str)
    -> DelegateResult<CredentialHandle>;

    /// Requests tokens for `resource` from a user-assigned identity.
    fn token_from_msi_with_user_assigned_id(
        &self,
        msi_endpoint: &str,
        resource: &str,
        user_assigned_id: &str,
    ) -> DelegateResult<CredentialHandle>;

    /// Requests tokens for `resource` with a client id and secret.
    fn token_from_secret(
        &self,
        oauth_config: OAuthConfig,
        client_id: &str,
        secret: &str,
        resource: &str,
    ) -> DelegateResult<CredentialHandle>;

    /// Requests tokens for `resource` with a client id and certificate.
    fn token_from_certificate(
        &self,
        oauth_config: OAuthConfig,
        client_id: &str,
        certificate: ClientCertificate,
        resource: &str,
    ) -> DelegateResult<CredentialHandle>;

    /// Requests tokens for `resource` in several tenants with a client secret.
    fn multi_tenant_token_from_secret(
        &self,
        oauth_config: MultiTenantOAuthConfig,
        client_id: &str,
        secret: &str,
        resource: &str,
    ) -> DelegateResult<MultiTenantCredentialHandle>;
}

/// The default [IdentityProvider], for Azure AD and ADFS authorities.
///
/// Example usage:
///
/// ```
/// # use azure_cloud_auth::identity::{AzureAdProvider, IdentityProvider};
/// let provider = AzureAdProvider::builder()
///     .msi_endpoint("http://localhost:8081/msi/token")
///     .build();
/// # let _ = provider.msi_endpoint();
/// ```
#[derive(Clone, Debug, Default)]
pub struct AzureAdProvider {
    msi_endpoint: Option<String>,
}

/// Creates [AzureAdProvider] instances.
#[derive(Debug, Default)]
pub struct Builder {
    msi_endpoint: Option<String>,
}

impl Builder {
    /// Sets the managed identity endpoint.
    ///
    /// If not set, the provider uses [MSI_VM_ENDPOINT]. App Service style
    /// endpoints (`MSI_ENDPOINT`) use a different protocol and are never
    /// picked up from the environment.
    pub fn msi_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.msi_endpoint = Some(endpoint.into());
        self
    }

    /// Returns an [AzureAdProvider] with the configured settings.
    pub fn build(self) -> AzureAdProvider {
        AzureAdProvider {
            msi_endpoint: self.msi_endpoint,
        }
    }
}

impl AzureAdProvider {
    /// Returns a builder to customize the provider.
    pub fn builder() -> Builder {
        Builder::default()
    }

    fn managed_identity(
        msi_endpoint: &str,
        resource: &str,
        user_assigned_id: Option<&str>,
    ) -> DelegateResult<CredentialHandle> {
        require(msi_endpoint, "msiEndpoint")?;
        require(resource, "resource")?;
        let endpoint = Url::parse(msi_endpoint)?;
        Ok(CredentialHandle::new(
            resource,
            Grant::ManagedIdentity {
                endpoint,
                user_assigned_id: user_assigned_id.map(str::to_string),
            },
        ))
    }
}

impl IdentityProvider for AzureAdProvider {
    fn msi_endpoint(&self) -> DelegateResult<String> {
        let endpoint = self
            .msi_endpoint
            .clone()
            .unwrap_or_else(|| MSI_VM_ENDPOINT.to_string());
        Url::parse(&endpoint)?;
        Ok(endpoint)
    }

    fn oauth_config(
        &self,
        active_directory_endpoint: &str,
        tenant_id: &str,
    ) -> DelegateResult<OAuthConfig> {
        OAuthConfig::new(active_directory_endpoint, tenant_id)
    }

    fn multi_tenant_oauth_config(
        &self,
        active_directory_endpoint: &str,
        primary_tenant_id: &str,
        auxiliary_tenant_ids: &[String],
    ) -> DelegateResult<MultiTenantOAuthConfig> {
        MultiTenantOAuthConfig::new(
            active_directory_endpoint,
            primary_tenant_id,
            auxiliary_tenant_ids,
        )
    }

    fn token_from_msi(
        &self,
        msi_endpoint: &str,
        resource: &str,
    ) -> DelegateResult<CredentialHandle> {
        Self::managed_identity(msi_endpoint, resource, None)
    }

    fn token_from_msi_with_user_assigned_id(
        &self,
        msi_endpoint: &str,
        resource: &str,
        user_assigned_id: &str,
    ) -> DelegateResult<CredentialHandle> {
        require(user_assigned_id, "userAssignedID")?;
        Self::managed_identity(msi_endpoint, resource, Some(user_assigned_id))
    }

    fn token_from_secret(
        &self,
        oauth_config: OAuthConfig,
        client_id: &str,
        secret: &str,
        resource: &str,
    ) -> DelegateResult<CredentialHandle> {
        require(client_id, "clientID")?;
        require(secret, "secret")?;
        require(resource, "resource")?;
        Ok(CredentialHandle::new(
            resource,
            Grant::ClientSecret {
                oauth_config,
                client_id: client_id.to_string(),
                secret: secret.to_string(),
            },
        ))
    }

    fn token_from_certificate(
        &self,
        oauth_config: OAuthConfig,
        client_id: &str,
        certificate: ClientCertificate,
        resource: &str,
    ) -> DelegateResult<CredentialHandle> {
        require(client_id, "clientID")?;
        require(resource, "resource")?;
        Ok(CredentialHandle::new(
            resource,
            Grant::ClientCertificate {
                oauth_config,
                client_id: client_id.to_string(),
                certificate,
            },
        ))
    }

    fn multi_tenant_token_from_secret(
        &self,
        oauth_config: MultiTenantOAuthConfig,
        client_id: &str,
        secret: &str,
        resource: &str,
    ) -> DelegateResult<MultiTenantCredentialHandle> {
        let primary = self.token_from_secret(oauth_config.primary, client_id, secret, resource)?;
        let auxiliary = oauth_config
            .auxiliary
            .into_iter()
            .map(|config| self.token_from_secret(config, client_id, secret, resource))
            .collect::<DelegateResult<Vec<_>>>()?;
        Ok(MultiTenantCredentialHandle::new(primary, auxiliary))
    }
}

pub(crate) fn require(value: &str, name: &str) -> DelegateResult<()> {
    if value.is_empty() {
        return Err(format!("parameter '{name}' cannot be empty").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoped_env::ScopedEnv;
    use serial_test::{parallel, serial};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    const RESOURCE: &str = "https://management.core.windows.net/";

    #[test]
    #[parallel]
    fn msi_endpoint_default() -> TestResult {
        let provider = AzureAdProvider::default();
        assert_eq!(provider.msi_endpoint()?, MSI_VM_ENDPOINT);
        Ok(())
    }

    #[test]
    #[parallel]
    fn msi_endpoint_override() -> TestResult {
        let provider = AzureAdProvider::builder()
            .msi_endpoint("http://localhost:8081/msi/token")
            .build();
        assert_eq!(provider.msi_endpoint()?, "http://localhost:8081/msi/token");
        Ok(())
    }

    #[test]
    #[serial]
    fn msi_endpoint_ignores_app_service_variable() -> TestResult {
        let _e = ScopedEnv::set("MSI_ENDPOINT", "http://127.0.0.1:41741/MSI/token/");
        let provider = AzureAdProvider::default();
        assert_eq!(provider.msi_endpoint()?, MSI_VM_ENDPOINT);

        let provider = AzureAdProvider::builder()
            .msi_endpoint("http://localhost:8081/msi/token")
            .build();
        assert_eq!(provider.msi_endpoint()?, "http://localhost:8081/msi/token");
        Ok(())
    }

    #[test]
    #[parallel]
    fn msi_endpoint_invalid() {
        let provider = AzureAdProvider::builder().msi_endpoint("not a url").build();
        assert!(provider.msi_endpoint().is_err());
    }

    #[test]
    #[parallel]
    fn token_from_msi() -> TestResult {
        let provider = AzureAdProvider::default();
        let handle = provider.token_from_msi(MSI_VM_ENDPOINT, RESOURCE)?;
        assert_eq!(handle.resource(), RESOURCE);
        assert_eq!(
            handle.grant(),
            &Grant::ManagedIdentity {
                endpoint: Url::parse(MSI_VM_ENDPOINT)?,
                user_assigned_id: None,
            }
        );
        Ok(())
    }

    #[test]
    #[parallel]
    fn token_from_msi_with_user_assigned_id() -> TestResult {
        let provider = AzureAdProvider::default();
        let handle =
            provider.token_from_msi_with_user_assigned_id(MSI_VM_ENDPOINT, RESOURCE, "test-id")?;
        assert_eq!(
            handle.grant(),
            &Grant::ManagedIdentity {
                endpoint: Url::parse(MSI_VM_ENDPOINT)?,
                user_assigned_id: Some("test-id".to_string()),
            }
        );

        let err = provider
            .token_from_msi_with_user_assigned_id(MSI_VM_ENDPOINT, RESOURCE, "")
            .unwrap_err();
        assert!(err.to_string().contains("userAssignedID"), "{err}");
        Ok(())
    }

    #[test]
    #[parallel]
    fn token_from_msi_requires_resource() {
        let provider = AzureAdProvider::default();
        let err = provider.token_from_msi(MSI_VM_ENDPOINT, "").unwrap_err();
        assert!(err.to_string().contains("resource"), "{err}");
    }

    #[test]
    #[parallel]
    fn token_from_secret() -> TestResult {
        let provider = AzureAdProvider::default();
        let config = provider.oauth_config("https://login.microsoftonline.com/", "tenant")?;
        let handle = provider.token_from_secret(config.clone(), "client", "secret", RESOURCE)?;
        assert_eq!(
            handle.grant(),
            &Grant::ClientSecret {
                oauth_config: config.clone(),
                client_id: "client".to_string(),
                secret: "secret".to_string(),
            }
        );

        let err = provider
            .token_from_secret(config, "client", "", RESOURCE)
            .unwrap_err();
        assert!(err.to_string().contains("secret"), "{err}");
        Ok(())
    }

    #[test]
    #[parallel]
    fn multi_tenant_token_from_secret() -> TestResult {
        let provider = AzureAdProvider::default();
        let config = provider.multi_tenant_oauth_config(
            "https://login.microsoftonline.com/",
            "primary",
            &["network".to_string()],
        )?;
        let handle =
            provider.multi_tenant_token_from_secret(config.clone(), "client", "secret", RESOURCE)?;
        assert_eq!(
            handle.primary(),
            &provider.token_from_secret(config.primary.clone(), "client", "secret", RESOURCE)?
        );
        assert_eq!(handle.auxiliary().len(), 1);
        assert_eq!(
            handle.auxiliary()[0],
            provider.token_from_secret(
                config.auxiliary[0].clone(),
                "client",
                "secret",
                RESOURCE
            )?
        );
        Ok(())
    }
}

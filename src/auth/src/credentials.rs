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

//! Selects and creates the credential described by an [AuthConfig].
//!
//! A configuration may satisfy more than one kind of credential, for example
//! it may enable the managed identity *and* carry a client secret. The
//! selector applies the following rules, in order, and the first match wins:
//!
//! 1. Managed identity enabled with a user-assigned identity ID:
//!    [Strategy::UserAssignedMsi].
//! 2. Managed identity enabled: [Strategy::SystemAssignedMsi].
//! 3. A client secret: [Strategy::ServicePrincipalSecret].
//! 4. A client certificate path: [Strategy::ServicePrincipalCertificate].
//!
//! Exactly one strategy is attempted. If the identity provider fails, the
//! error is returned to the caller, the selector never falls back to a
//! different strategy.
//!
//! Example usage:
//!
//! ```
//! # use azure_cloud_auth::config::AuthConfig;
//! # use azure_cloud_auth::credentials::{select_and_acquire, Strategy};
//! # use azure_cloud_auth::environment::Environment;
//! # fn sample() -> Result<(), azure_cloud_auth::errors::Error> {
//! let config = AuthConfig {
//!     tenant_id: "my-tenant".to_string(),
//!     aad_client_id: "my-client".to_string(),
//!     aad_client_secret: "my-secret".to_string(),
//!     ..Default::default()
//! };
//! let handle = select_and_acquire(&config, Environment::public_cloud())?;
//! assert_eq!(handle.strategy(), Strategy::ServicePrincipalSecret);
//! # Ok(()) }
//! # sample().unwrap();
//! ```

mod certificate;

pub use certificate::ClientCertificate;

use crate::Result;
use crate::config::AuthConfig;
use crate::environment::{Environment, IdentitySystem};
use crate::errors::Error;
use crate::identity::{AzureAdProvider, IdentityProvider, OAuthConfig};
use url::Url;

/// The tenant used in the authority of ADFS identity systems.
pub const ADFS_TENANT: &str = "adfs";

/// The kinds of credentials created by the selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The managed identity of the host, with an explicit user-assigned ID.
    UserAssignedMsi,
    /// The system-assigned managed identity of the host.
    SystemAssignedMsi,
    /// A service principal with a client secret.
    ServicePrincipalSecret,
    /// A service principal with a client certificate.
    ServicePrincipalCertificate,
}

impl Strategy {
    /// The selection rules, highest precedence first.
    pub const PRECEDENCE: [Strategy; 4] = [
        Strategy::UserAssignedMsi,
        Strategy::SystemAssignedMsi,
        Strategy::ServicePrincipalSecret,
        Strategy::ServicePrincipalCertificate,
    ];

    /// The tag used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserAssignedMsi => "user-assigned-MSI",
            Self::SystemAssignedMsi => "system-assigned-MSI",
            Self::ServicePrincipalSecret => "service-principal-secret",
            Self::ServicePrincipalCertificate => "service-principal-certificate",
        }
    }

    /// Returns true if `config` satisfies this rule, ignoring precedence.
    pub fn matches(&self, config: &AuthConfig) -> bool {
        match self {
            Self::UserAssignedMsi => {
                config.use_managed_identity_extension
                    && !config.user_assigned_identity_id.is_empty()
            }
            Self::SystemAssignedMsi => config.use_managed_identity_extension,
            Self::ServicePrincipalSecret => !config.aad_client_secret.is_empty(),
            Self::ServicePrincipalCertificate => !config.aad_client_cert_path.is_empty(),
        }
    }

    /// The first rule in [Strategy::PRECEDENCE] matching `config`.
    pub fn select(config: &AuthConfig) -> Result<Strategy> {
        Self::PRECEDENCE
            .into_iter()
            .find(|s| s.matches(config))
            .ok_or_else(|| Error::missing_field("aadClientSecret", None))
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a [CredentialHandle] obtains tokens.
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    /// Tokens from the managed identity endpoint.
    ManagedIdentity {
        endpoint: Url,
        /// The user-assigned identity, `None` for the system-assigned identity.
        user_assigned_id: Option<String>,
    },
    /// OAuth 2.0 client credentials with a client secret.
    ClientSecret {
        oauth_config: OAuthConfig,
        client_id: String,
        secret: String,
    },
    /// OAuth 2.0 client credentials with a client certificate.
    ClientCertificate {
        oauth_config: OAuthConfig,
        client_id: String,
        certificate: ClientCertificate,
    },
}

impl std::fmt::Debug for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ManagedIdentity {
                endpoint,
                user_assigned_id,
            } => f
                .debug_struct("ManagedIdentity")
                .field("endpoint", &endpoint.as_str())
                .field("user_assigned_id", user_assigned_id)
                .finish(),
            Self::ClientSecret {
                oauth_config,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("oauth_config", oauth_config)
                .field("client_id", client_id)
                .field("secret", &"[censored]")
                .finish(),
            Self::ClientCertificate {
                oauth_config,
                client_id,
                certificate,
            } => f
                .debug_struct("ClientCertificate")
                .field("oauth_config", oauth_config)
                .field("client_id", client_id)
                .field("certificate", certificate)
                .finish(),
        }
    }
}

/// A credential ready to request tokens for one resource.
///
/// The handle records the resolved parameters, two handles built from the
/// same parameters compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialHandle {
    resource: String,
    grant: Grant,
}

impl CredentialHandle {
    pub(crate) fn new(resource: &str, grant: Grant) -> Self {
        Self {
            resource: resource.to_string(),
            grant,
        }
    }

    /// The resource, or audience, of the tokens.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn grant(&self) -> &Grant {
        &self.grant
    }

    /// The strategy that produced this handle.
    pub fn strategy(&self) -> Strategy {
        match &self.grant {
            Grant::ManagedIdentity {
                user_assigned_id: Some(_),
                ..
            } => Strategy::UserAssignedMsi,
            Grant::ManagedIdentity { .. } => Strategy::SystemAssignedMsi,
            Grant::ClientSecret { .. } => Strategy::ServicePrincipalSecret,
            Grant::ClientCertificate { .. } => Strategy::ServicePrincipalCertificate,
        }
    }
}

/// Credentials for a primary tenant and its auxiliary tenants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiTenantCredentialHandle {
    primary: CredentialHandle,
    auxiliary: Vec<CredentialHandle>,
}

impl MultiTenantCredentialHandle {
    pub(crate) fn new(primary: CredentialHandle, auxiliary: Vec<CredentialHandle>) -> Self {
        Self { primary, auxiliary }
    }

    pub fn primary(&self) -> &CredentialHandle {
        &self.primary
    }

    pub fn auxiliary(&self) -> &[CredentialHandle] {
        &self.auxiliary
    }
}

/// Creates credentials using the rules described in the [module docs][self].
///
/// The selector only decides which call to make on its [IdentityProvider].
#[derive(Clone, Debug, Default)]
pub struct CredentialSelector<P = AzureAdProvider> {
    provider: P,
}

impl<P> CredentialSelector<P>
where
    P: IdentityProvider,
{
    /// Creates a selector delegating to `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Selects the strategy for `config` and creates its credential.
    pub fn select_and_acquire(
        &self,
        config: &AuthConfig,
        env: &Environment,
    ) -> Result<CredentialHandle> {
        let strategy = Strategy::select(config)?;
        tracing::info!(
            strategy = %strategy,
            environment = %env.name,
            "selected credential strategy"
        );
        let resource = env.service_management_endpoint.as_str();
        match strategy {
            Strategy::UserAssignedMsi => {
                let endpoint = self
                    .provider
                    .msi_endpoint()
                    .map_err(|e| Error::delegate(strategy, e))?;
                self.provider
                    .token_from_msi_with_user_assigned_id(
                        &endpoint,
                        resource,
                        &config.user_assigned_identity_id,
                    )
                    .map_err(|e| Error::delegate(strategy, e))
            }
            Strategy::SystemAssignedMsi => {
                let endpoint = self
                    .provider
                    .msi_endpoint()
                    .map_err(|e| Error::delegate(strategy, e))?;
                self.provider
                    .token_from_msi(&endpoint, resource)
                    .map_err(|e| Error::delegate(strategy, e))
            }
            Strategy::ServicePrincipalSecret => {
                let oauth_config = self.oauth_config(config, env, strategy)?;
                self.provider
                    .token_from_secret(
                        oauth_config,
                        &config.aad_client_id,
                        &config.aad_client_secret,
                        resource,
                    )
                    .map_err(|e| Error::delegate(strategy, e))
            }
            Strategy::ServicePrincipalCertificate => {
                let oauth_config = self.oauth_config(config, env, strategy)?;
                let certificate = ClientCertificate::from_pem_file(&config.aad_client_cert_path)?;
                self.provider
                    .token_from_certificate(
                        oauth_config,
                        &config.aad_client_id,
                        certificate,
                        resource,
                    )
                    .map_err(|e| Error::delegate(strategy, e))
            }
        }
    }

    /// Creates a credential valid in `tenant_id` and `network_resource_tenant_id`.
    ///
    /// Only client secrets support multiple tenants.
    pub fn multi_tenant(
        &self,
        config: &AuthConfig,
        env: &Environment,
    ) -> Result<MultiTenantCredentialHandle> {
        let strategy = Self::require_secret(config)?;
        Self::require_field(
            &config.network_resource_tenant_id,
            "networkResourceTenantID",
            strategy,
        )?;
        let tenant = Self::tenant(config, strategy)?;
        Self::require_field(&config.aad_client_id, "aadClientId", strategy)?;
        tracing::info!(
            strategy = %strategy,
            environment = %env.name,
            "selected multi-tenant credential strategy"
        );

        let oauth_config = self
            .provider
            .multi_tenant_oauth_config(
                &env.active_directory_endpoint,
                tenant,
                &[config.network_resource_tenant_id.clone()],
            )
            .map_err(|e| Error::delegate(strategy, e))?;
        self.provider
            .multi_tenant_token_from_secret(
                oauth_config,
                &config.aad_client_id,
                &config.aad_client_secret,
                &env.service_management_endpoint,
            )
            .map_err(|e| Error::delegate(strategy, e))
    }

    /// Creates a credential for the tenant of the network resources.
    ///
    /// Only client secrets are supported.
    pub fn network_resource(
        &self,
        config: &AuthConfig,
        env: &Environment,
    ) -> Result<CredentialHandle> {
        let strategy = Self::require_secret(config)?;
        Self::require_field(
            &config.network_resource_tenant_id,
            "networkResourceTenantID",
            strategy,
        )?;
        Self::require_field(&config.aad_client_id, "aadClientId", strategy)?;
        tracing::info!(
            strategy = %strategy,
            environment = %env.name,
            "selected network resource credential strategy"
        );

        let oauth_config = self
            .provider
            .oauth_config(&env.active_directory_endpoint, &config.network_resource_tenant_id)
            .map_err(|e| Error::delegate(strategy, e))?;
        self.provider
            .token_from_secret(
                oauth_config,
                &config.aad_client_id,
                &config.aad_client_secret,
                &env.service_management_endpoint,
            )
            .map_err(|e| Error::delegate(strategy, e))
    }

    fn oauth_config(
        &self,
        config: &AuthConfig,
        env: &Environment,
        strategy: Strategy,
    ) -> Result<OAuthConfig> {
        let tenant = Self::tenant(config, strategy)?;
        Self::require_field(&config.aad_client_id, "aadClientId", strategy)?;
        self.provider
            .oauth_config(&env.active_directory_endpoint, tenant)
            .map_err(|e| Error::delegate(strategy, e))
    }

    fn tenant(config: &AuthConfig, strategy: Strategy) -> Result<&str> {
        if config.identity_system() == IdentitySystem::Adfs {
            return Ok(ADFS_TENANT);
        }
        Self::require_field(&config.tenant_id, "tenantId", strategy)?;
        Ok(&config.tenant_id)
    }

    fn require_secret(config: &AuthConfig) -> Result<Strategy> {
        if config.use_managed_identity_extension {
            return Err(Error::invalid_config(
                "managed identities do not support multiple tenants, use a client secret",
            ));
        }
        let strategy = Strategy::ServicePrincipalSecret;
        Self::require_field(&config.aad_client_secret, "aadClientSecret", strategy)?;
        Ok(strategy)
    }

    fn require_field(value: &str, field: &'static str, strategy: Strategy) -> Result<()> {
        if value.is_empty() {
            return Err(Error::missing_field(field, Some(strategy)));
        }
        Ok(())
    }
}

/// Creates the credential for `config` using the default [AzureAdProvider].
///
/// See [CredentialSelector::select_and_acquire].
pub fn select_and_acquire(config: &AuthConfig, env: &Environment) -> Result<CredentialHandle> {
    CredentialSelector::<AzureAdProvider>::default().select_and_acquire(config, env)
}

/// See [CredentialSelector::multi_tenant].
pub fn multi_tenant(config: &AuthConfig, env: &Environment) -> Result<MultiTenantCredentialHandle> {
    CredentialSelector::<AzureAdProvider>::default().multi_tenant(config, env)
}

/// See [CredentialSelector::network_resource].
pub fn network_resource(config: &AuthConfig, env: &Environment) -> Result<CredentialHandle> {
    CredentialSelector::<AzureAdProvider>::default().network_resource(config, env)
}

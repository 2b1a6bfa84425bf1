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

use super::{DelegateResult, require};
use url::Url;

const API_VERSION: &str = "1.0";
const MAX_AUXILIARY_TENANTS: usize = 3;

/// The tenant-scoped endpoints of an OAuth authority.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OAuthConfig {
    /// The authority, `{active_directory_endpoint}/{tenant}`.
    pub authority_endpoint: Url,
    pub authorize_endpoint: Url,
    pub token_endpoint: Url,
    pub device_code_endpoint: Url,
}

impl OAuthConfig {
    /// Builds the authority endpoints for `tenant_id`.
    ///
    /// An empty tenant is accepted, the authority is then the
    /// `active_directory_endpoint` itself.
    pub fn new(active_directory_endpoint: &str, tenant_id: &str) -> DelegateResult<Self> {
        require(active_directory_endpoint, "activeDirectoryEndpoint")?;
        let base = Url::parse(active_directory_endpoint)?;
        let endpoint = |kind: &str| -> DelegateResult<Url> {
            let mut url = base.join(&format!("{tenant_id}/oauth2/{kind}"))?;
            url.query_pairs_mut().append_pair("api-version", API_VERSION);
            Ok(url)
        };
        Ok(Self {
            authority_endpoint: base.join(tenant_id)?,
            authorize_endpoint: endpoint("authorize")?,
            token_endpoint: endpoint("token")?,
            device_code_endpoint: endpoint("devicecode")?,
        })
    }
}

/// The authority endpoints for a primary tenant and its auxiliary tenants.
///
/// Tokens issued with this configuration grant access to resources in all
/// the tenants, which is needed when, for example, the network resources live
/// in a different tenant than the cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiTenantOAuthConfig {
    pub primary: OAuthConfig,
    pub auxiliary: Vec<OAuthConfig>,
}

impl MultiTenantOAuthConfig {
    /// Builds the authority endpoints for one to three auxiliary tenants.
    pub fn new(
        active_directory_endpoint: &str,
        primary_tenant_id: &str,
        auxiliary_tenant_ids: &[String],
    ) -> DelegateResult<Self> {
        if auxiliary_tenant_ids.is_empty() || auxiliary_tenant_ids.len() > MAX_AUXILIARY_TENANTS {
            return Err(format!(
                "must specify one to {MAX_AUXILIARY_TENANTS} auxiliary tenants, got {}",
                auxiliary_tenant_ids.len()
            )
            .into());
        }
        let primary = OAuthConfig::new(active_directory_endpoint, primary_tenant_id)?;
        let auxiliary = auxiliary_tenant_ids
            .iter()
            .map(|tenant| {
                require(tenant, "auxiliaryTenantID")?;
                OAuthConfig::new(active_directory_endpoint, tenant)
            })
            .collect::<DelegateResult<Vec<_>>>()?;
        Ok(Self { primary, auxiliary })
    }
}

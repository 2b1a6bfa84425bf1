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

use azure_cloud_auth::config::{self, AuthConfig};
use azure_cloud_auth::credentials::{self, CredentialSelector, Strategy};
use azure_cloud_auth::environment::{self, ENVIRONMENT_FILEPATH_VAR, Environment};
use azure_cloud_auth::identity::{AzureAdProvider, IdentityProvider, MSI_VM_ENDPOINT};

type TestResult = anyhow::Result<()>;

#[cfg(test)]
mod test {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use scoped_env::ScopedEnv;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn user_assigned_msi() -> TestResult {
        let config = AuthConfig {
            use_managed_identity_extension: true,
            user_assigned_identity_id: "UserAssignedIdentityID".to_string(),
            ..Default::default()
        };
        let env = Environment::public_cloud();

        let token = credentials::select_and_acquire(&config, env)?;

        let provider = AzureAdProvider::default();
        let msi_endpoint = provider.msi_endpoint()?;
        let want = provider.token_from_msi_with_user_assigned_id(
            &msi_endpoint,
            &env.service_management_endpoint,
            &config.user_assigned_identity_id,
        )?;
        assert_eq!(token, want);
        assert_eq!(token.strategy(), Strategy::UserAssignedMsi);
        Ok(())
    }

    #[test]
    fn system_assigned_msi() -> TestResult {
        let config = AuthConfig {
            use_managed_identity_extension: true,
            ..Default::default()
        };
        let env = Environment::public_cloud();

        let token = credentials::select_and_acquire(&config, env)?;

        let provider = AzureAdProvider::default();
        let msi_endpoint = provider.msi_endpoint()?;
        let want = provider.token_from_msi(&msi_endpoint, &env.service_management_endpoint)?;
        assert_eq!(token, want);
        Ok(())
    }

    #[test]
    #[serial]
    fn msi_endpoint_ignores_app_service_variable() -> TestResult {
        let _e = ScopedEnv::set("MSI_ENDPOINT", "http://127.0.0.1:41741/MSI/token/");
        let config = AuthConfig {
            use_managed_identity_extension: true,
            ..Default::default()
        };
        let env = Environment::public_cloud();

        let token = credentials::select_and_acquire(&config, env)?;
        let want = AzureAdProvider::default().token_from_msi(
            MSI_VM_ENDPOINT,
            &env.service_management_endpoint,
        )?;
        assert_eq!(token, want);

        let provider = AzureAdProvider::builder()
            .msi_endpoint("http://localhost:8081/msi/token")
            .build();
        let token = CredentialSelector::new(provider.clone()).select_and_acquire(&config, env)?;
        let want = provider.token_from_msi(
            "http://localhost:8081/msi/token",
            &env.service_management_endpoint,
        )?;
        assert_eq!(token, want);
        Ok(())
    }

    #[test]
    fn service_principal_secret() -> TestResult {
        let config = AuthConfig {
            tenant_id: "TenantID".to_string(),
            aad_client_id: "AADClientID".to_string(),
            aad_client_secret: "AADClientSecret".to_string(),
            ..Default::default()
        };
        let env = Environment::public_cloud();

        let token = CredentialSelector::new(AzureAdProvider::default())
            .select_and_acquire(&config, env)?;

        let provider = AzureAdProvider::default();
        let oauth_config =
            provider.oauth_config(&env.active_directory_endpoint, &config.tenant_id)?;
        let want = provider.token_from_secret(
            oauth_config,
            &config.aad_client_id,
            &config.aad_client_secret,
            &env.service_management_endpoint,
        )?;
        assert_eq!(token, want);
        assert_eq!(token.strategy(), Strategy::ServicePrincipalSecret);
        Ok(())
    }

    #[tokio::test]
    async fn parse_environment() -> TestResult {
        let cases = [
            ("", Environment::public_cloud()),
            ("AZURECHINACLOUD", Environment::china_cloud()),
        ];
        for (cloud_name, want) in cases {
            let env = environment::resolve(cloud_name, "", "").await?;
            assert_eq!(&env, want, "{cloud_name}");
        }
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn stack_cloud_from_file() -> TestResult {
        let file = tempfile::NamedTempFile::new()?;
        let path = file.into_temp_path();
        let contents = json!({
            "name": "AzureStackCloud",
            "managementPortalURL": "https://portal.local.azurestack.external/",
            "serviceManagementEndpoint": "https://management.adfs.azurestack.local/test-audience",
            "resourceManagerEndpoint": "https://management.local.azurestack.external/",
            "activeDirectoryEndpoint": "https://adfs.local.azurestack.external/",
            "tokenAudience": "https://management.adfs.azurestack.local/test-audience"
        });
        std::fs::write(&path, contents.to_string())?;
        let _e = ScopedEnv::set(ENVIRONMENT_FILEPATH_VAR, &path.to_string_lossy());

        let env = environment::resolve("AzureStackCloud", "", "").await?;
        assert_eq!(env.name, "AzureStackCloud");
        assert_eq!(
            env.active_directory_endpoint,
            "https://adfs.local.azurestack.external/"
        );
        Ok(())
    }

    #[tokio::test]
    async fn load_custom_cloud_config() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/metadata/endpoints"),
                request::query(url_decoded(contains(("api-version", "1.0")))),
            ])
            .respond_with(json_encoded(json!({
                "galleryEndpoint": "https://providers.local.azurestack.external:30016/",
                "graphEndpoint": "https://graph.local.azurestack.external/",
                "portalEndpoint": "https://portal.local.azurestack.external/",
                "authentication": {
                    "loginEndpoint": "https://adfs.local.azurestack.external/adfs/",
                    "audiences": ["https://management.adfs.azurestack.local/test-audience"]
                }
            }))),
        );

        let file = tempfile::NamedTempFile::new()?;
        let path = file.into_temp_path();
        let contents = json!({
            "cloud": "AzureStackCloud",
            "identitySystem": "adfs",
            "resourceManagerEndpoint": server.url_str("/"),
            "aadClientId": "test-client",
            "aadClientSecret": "test-secret"
        });
        std::fs::write(&path, contents.to_string())?;

        let (config, env) = config::load(&path).await?;
        assert_eq!(env.name, "AzureStackCloud");
        assert_eq!(
            env.active_directory_endpoint,
            "https://adfs.local.azurestack.external/"
        );
        assert_eq!(
            env.service_management_endpoint,
            "https://management.adfs.azurestack.local/test-audience"
        );

        let token = credentials::select_and_acquire(&config, &env)?;
        let provider = AzureAdProvider::default();
        let oauth_config = provider.oauth_config(&env.active_directory_endpoint, "adfs")?;
        let want = provider.token_from_secret(
            oauth_config,
            "test-client",
            "test-secret",
            &env.service_management_endpoint,
        )?;
        assert_eq!(token, want);
        Ok(())
    }
}

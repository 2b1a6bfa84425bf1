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

//! Azure authentication configuration for Rust
//!
//! This crate maps the authentication section of an Azure cloud configuration
//! to a credential. It picks one of several strategies (managed identity,
//! service principal with a secret or a certificate) and resolves the cloud
//! environment, that is, the authority and audience endpoints used by the
//! credential.
//!
//! The crate does not exchange tokens. The [credentials::CredentialHandle]
//! values it creates record everything a token client needs, and compare
//! equal when built from the same parameters.
//!
//! ```
//! # use azure_cloud_auth::{config::AuthConfig, credentials, environment};
//! # tokio_test::block_on(async {
//! let config = AuthConfig::from_json(br#"{
//!     "cloud": "AzurePublicCloud",
//!     "useManagedIdentityExtension": true,
//!     "userAssignedIdentityID": "my-identity"
//! }"#)?;
//! let env = config.environment().await?;
//! let handle = credentials::select_and_acquire(&config, &env)?;
//! println!("selected {}", handle.strategy());
//! # Ok::<(), azure_cloud_auth::errors::Error>(())
//! # });
//! ```

pub mod errors;

/// Cloud environments and their endpoints.
pub mod environment;

/// Types and functions to select and create credentials.
pub mod credentials;

/// The identity provider seam used by the credential selector.
pub mod identity;

pub mod config;

/// A `Result` alias where the `Err` case is `azure_cloud_auth::errors::Error`.
pub(crate) type Result<T> = std::result::Result<T, crate::errors::Error>;

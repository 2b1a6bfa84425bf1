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

//! Errors created while resolving environments and selecting credentials.

use crate::credentials::Strategy;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type for environment resolution and credential selection.
///
/// The type is opaque, use the `is_*()` predicates to classify it. When the
/// failure originates in the identity provider, or in the environment
/// metadata endpoint, the original error is available, unmodified, via
/// [std::error::Error::source].
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    /// The cloud name does not match any known cloud environment.
    ///
    /// This is a configuration error, retrying without fixing the
    /// configuration will not succeed.
    pub fn is_unknown_cloud_name(&self) -> bool {
        matches!(self.0, ErrorKind::UnknownCloudName(_))
    }

    /// The configuration is not usable for the selected strategy.
    ///
    /// This includes missing fields, see [Error::is_missing_field].
    pub fn is_invalid_config(&self) -> bool {
        matches!(
            self.0,
            ErrorKind::InvalidConfig(_) | ErrorKind::MissingField { .. }
        )
    }

    /// A required configuration field was empty.
    pub fn is_missing_field(&self) -> bool {
        matches!(self.0, ErrorKind::MissingField { .. })
    }

    /// The identity provider, or the environment metadata endpoint, failed.
    ///
    /// These errors may be transient. The caller decides whether to retry.
    pub fn is_delegate(&self) -> bool {
        matches!(
            self.0,
            ErrorKind::Delegate { .. } | ErrorKind::Metadata(_)
        )
    }

    /// A problem finding or reading a file.
    pub fn is_loading(&self) -> bool {
        matches!(self.0, ErrorKind::Loading(_))
    }

    /// A problem parsing the contents of a file or a response.
    pub fn is_parsing(&self) -> bool {
        matches!(self.0, ErrorKind::Parsing(_))
    }

    /// A file exceeded the size limit, see [crate::config::MAX_CONFIG_SIZE].
    pub fn is_too_large(&self) -> bool {
        matches!(self.0, ErrorKind::TooLarge(_))
    }

    /// The strategy that was attempted when the error occurred, if any.
    pub fn strategy(&self) -> Option<Strategy> {
        match &self.0 {
            ErrorKind::Delegate { strategy, .. } => Some(*strategy),
            ErrorKind::MissingField { strategy, .. } => *strategy,
            _ => None,
        }
    }

    pub(crate) fn unknown_cloud_name<T: Into<String>>(name: T) -> Error {
        Error(ErrorKind::UnknownCloudName(name.into()))
    }

    pub(crate) fn invalid_config<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::InvalidConfig(source.into()))
    }

    pub(crate) fn missing_field(field: &'static str, strategy: Option<Strategy>) -> Error {
        Error(ErrorKind::MissingField { field, strategy })
    }

    pub(crate) fn delegate<T>(strategy: Strategy, source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Delegate {
            strategy,
            source: source.into(),
        })
    }

    pub(crate) fn metadata<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Metadata(source.into()))
    }

    pub(crate) fn loading<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Loading(source.into()))
    }

    pub(crate) fn parsing<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Parsing(source.into()))
    }

    pub(crate) fn too_large<T: Into<String>>(message: T) -> Error {
        Error(ErrorKind::TooLarge(message.into()))
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("there is no cloud environment matching the name {0:?}")]
    UnknownCloudName(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[source] BoxError),
    #[error("missing required field: {field}")]
    MissingField {
        field: &'static str,
        strategy: Option<Strategy>,
    },
    #[error("cannot create {strategy} credential: {source}")]
    Delegate {
        strategy: Strategy,
        #[source]
        source: BoxError,
    },
    #[error("cannot load environment metadata: {0}")]
    Metadata(#[source] BoxError),
    #[error("could not find or read the file {0}")]
    Loading(#[source] BoxError),
    #[error("cannot parse the contents: {0}")]
    Parsing(#[source] BoxError),
    #[error("the file is too large: {0}")]
    TooLarge(String),
}

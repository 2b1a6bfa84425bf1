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
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::path::Path;

/// A client certificate and its private key, used as a service principal
/// credential.
///
/// The certificate chain is kept in the order it appears in the PEM file, the
/// first certificate is the client certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    chain: Vec<Vec<u8>>,
    private_key: Vec<u8>,
}

impl ClientCertificate {
    /// Parses a PEM document with one or more `CERTIFICATE` sections and one
    /// private key (PKCS#8, PKCS#1 or SEC1).
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let chain = CertificateDer::pem_slice_iter(pem)
            .map(|cert| cert.map(|c| c.to_vec()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::parsing)?;
        if chain.is_empty() {
            return Err(Error::parsing(
                "missing CERTIFICATE section in client certificate",
            ));
        }
        let private_key = PrivateKeyDer::from_pem_slice(pem).map_err(Error::parsing)?;
        Ok(Self {
            chain,
            private_key: private_key.secret_der().to_vec(),
        })
    }

    /// Reads a PEM client certificate, see [ClientCertificate::from_pem].
    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read(path).map_err(|e| {
            Error::loading(format!(
                "cannot read the client certificate from {}: {e}",
                path.display()
            ))
        })?;
        Self::from_pem(&contents)
    }

    /// The DER encoded certificates, client certificate first.
    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    /// The DER encoded private key.
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key
    }
}

impl std::fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("chain", &format!("[{} certificate(s)]", self.chain.len()))
            .field("private_key", &"[censored]")
            .finish()
    }
}

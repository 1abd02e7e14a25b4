// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use azstore_core::hash::base64_decode;
use azstore_core::utils::Redact;
use azstore_core::{Error, Result, SigningCredential};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Decoded storage account key.
///
/// The key is validated and decoded once, when the credential is built, so
/// signing never has to deal with malformed key material.
#[derive(Clone)]
pub struct AccountKey {
    encoded: Arc<str>,
    decoded: Arc<[u8]>,
}

impl AccountKey {
    /// Decode a base64 account key.
    pub fn new(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(Error::credential_invalid("account key is empty"));
        }
        let decoded = base64_decode(encoded).map_err(|e| {
            Error::credential_invalid("account key is not valid base64").with_source(e)
        })?;

        Ok(Self {
            encoded: encoded.into(),
            decoded: decoded.into(),
        })
    }

    /// Raw key bytes used as the HMAC key.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.decoded
    }
}

impl Debug for AccountKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Redact::from(&*self.encoded).fmt(f)
    }
}

/// Credential enum for the supported storage authentication methods.
#[derive(Clone)]
pub enum Credential {
    /// Shared Key authentication with account name and key
    SharedKey {
        /// Storage account name.
        account_name: String,
        /// Decoded storage account key.
        account_key: AccountKey,
    },
    /// SAS (Shared Access Signature) token authentication
    SasToken {
        /// SAS token, without the leading `?`.
        token: String,
    },
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::SharedKey {
                account_name,
                account_key,
            } => f
                .debug_struct("Credential::SharedKey")
                .field("account_name", account_name)
                .field("account_key", account_key)
                .finish(),
            Credential::SasToken { token } => f
                .debug_struct("Credential::SasToken")
                .field("token", &Redact::from(token))
                .finish(),
        }
    }
}

impl SigningCredential for Credential {
    fn is_valid(&self) -> bool {
        match self {
            Credential::SharedKey { account_name, .. } => !account_name.is_empty(),
            Credential::SasToken { token } => !token.is_empty(),
        }
    }
}

impl Credential {
    /// Create a new credential with shared key authentication.
    ///
    /// Fails with [`azstore_core::ErrorKind::CredentialInvalid`] if the
    /// account name is empty or the key is not valid base64.
    pub fn with_shared_key(account_name: &str, account_key: &str) -> Result<Self> {
        if account_name.is_empty() {
            return Err(Error::credential_invalid("account name is empty"));
        }

        Ok(Self::SharedKey {
            account_name: account_name.to_string(),
            account_key: AccountKey::new(account_key)?,
        })
    }

    /// Create a new credential with SAS token authentication.
    pub fn with_sas_token(sas_token: &str) -> Result<Self> {
        let token = sas_token.trim_start_matches('?');
        if token.is_empty() {
            return Err(Error::credential_invalid("sas token is empty"));
        }

        Ok(Self::SasToken {
            token: token.to_string(),
        })
    }

    /// Borrow account name and key, failing for SAS credentials.
    pub(crate) fn shared_key(&self) -> Result<(&str, &AccountKey)> {
        match self {
            Credential::SharedKey {
                account_name,
                account_key,
            } => Ok((account_name, account_key)),
            Credential::SasToken { .. } => Err(Error::credential_invalid(
                "shared key credential is required, got a sas token",
            )),
        }
    }
}

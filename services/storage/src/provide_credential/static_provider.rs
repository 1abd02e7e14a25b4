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

use async_trait::async_trait;
use azstore_core::{Context, ProvideCredential, Result};

use crate::credential::Credential;

/// StaticCredentialProvider always returns the credential it was built with.
#[derive(Clone, Debug)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    /// Create a provider from an existing credential.
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    /// Create a provider for shared key authentication.
    ///
    /// The key is decoded here, a malformed key fails before any request is built.
    pub fn new_shared_key(account_name: &str, account_key: &str) -> Result<Self> {
        Ok(Self {
            credential: Credential::with_shared_key(account_name, account_key)?,
        })
    }

    /// Create a provider for SAS token authentication.
    pub fn new_sas_token(sas_token: &str) -> Result<Self> {
        Ok(Self {
            credential: Credential::with_sas_token(sas_token)?,
        })
    }
}

#[async_trait]
impl ProvideCredential for StaticCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
        Ok(Some(self.credential.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azstore_core::ErrorKind;

    #[tokio::test]
    async fn test_static_shared_key() {
        let provider = StaticCredentialProvider::new_shared_key("myaccount", "a2V5").unwrap();
        let cred = provider
            .provide_credential(&Context::new())
            .await
            .unwrap()
            .unwrap();

        match cred {
            Credential::SharedKey { account_name, .. } => assert_eq!(account_name, "myaccount"),
            _ => panic!("expected shared key credential"),
        }
    }

    #[tokio::test]
    async fn test_static_sas_token() {
        let provider = StaticCredentialProvider::new_sas_token("?sv=2016-05-31&sig=abc").unwrap();
        let cred = provider
            .provide_credential(&Context::new())
            .await
            .unwrap()
            .unwrap();

        match cred {
            Credential::SasToken { token } => assert_eq!(token, "sv=2016-05-31&sig=abc"),
            _ => panic!("expected sas token credential"),
        }
    }

    #[test]
    fn test_static_invalid_key() {
        let err = StaticCredentialProvider::new_shared_key("myaccount", "%%%").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
    }
}

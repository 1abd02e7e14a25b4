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

use crate::constants::*;
use crate::credential::Credential;

/// EnvCredentialProvider loads a credential from environment variables.
///
/// An account name plus key wins over a SAS token. Returns `None` when
/// neither is present.
///
/// - [`AZURE_STORAGE_ACCOUNT_NAME`] and [`AZURE_STORAGE_ACCOUNT_KEY`]
/// - [`AZURE_STORAGE_SAS_TOKEN`]
#[derive(Clone, Debug, Default)]
pub struct EnvCredentialProvider {}

impl EnvCredentialProvider {
    /// Create a new env provider.
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let envs = ctx.env_vars();

        if let (Some(account_name), Some(account_key)) = (
            envs.get(AZURE_STORAGE_ACCOUNT_NAME),
            envs.get(AZURE_STORAGE_ACCOUNT_KEY),
        ) {
            return Ok(Some(Credential::with_shared_key(account_name, account_key)?));
        }

        if let Some(sas_token) = envs.get(AZURE_STORAGE_SAS_TOKEN) {
            return Ok(Some(Credential::with_sas_token(sas_token)?));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azstore_core::{ErrorKind, StaticEnv};
    use std::collections::HashMap;

    fn ctx(pairs: &[(&str, &str)]) -> Context {
        let envs = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Context::new().with_env(StaticEnv { envs })
    }

    #[tokio::test]
    async fn test_env_credential_provider_account_key() {
        let ctx = ctx(&[
            (AZURE_STORAGE_ACCOUNT_NAME, "myaccount"),
            (AZURE_STORAGE_ACCOUNT_KEY, "a2V5"),
            (AZURE_STORAGE_SAS_TOKEN, "sig=abc"),
        ]);

        let cred = EnvCredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(cred, Credential::SharedKey { ref account_name, .. } if account_name == "myaccount"));
    }

    #[tokio::test]
    async fn test_env_credential_provider_sas_token() {
        let ctx = ctx(&[
            (AZURE_STORAGE_ACCOUNT_NAME, "myaccount"),
            (AZURE_STORAGE_SAS_TOKEN, "sv=2016-05-31&sig=abc"),
        ]);

        let cred = EnvCredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(cred, Credential::SasToken { ref token } if token == "sv=2016-05-31&sig=abc"));
    }

    #[tokio::test]
    async fn test_env_credential_provider_empty() {
        let cred = EnvCredentialProvider::new()
            .provide_credential(&ctx(&[]))
            .await
            .unwrap();
        assert!(cred.is_none());
    }

    #[tokio::test]
    async fn test_env_credential_provider_bad_key() {
        let ctx = ctx(&[
            (AZURE_STORAGE_ACCOUNT_NAME, "myaccount"),
            (AZURE_STORAGE_ACCOUNT_KEY, "not base64!"),
        ]);

        let err = EnvCredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
    }
}

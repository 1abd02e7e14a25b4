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

use std::time::Duration;

use async_trait::async_trait;
use azstore_core::hash::base64_hmac_sha256;
use azstore_core::time::{format_http_date, now, DateTime};
use azstore_core::{Context, Error, Result, SignRequest, SigningMethod, SigningRequest};
use http::request::Parts;
use http::{header, HeaderValue};
use log::debug;
use percent_encoding::utf8_percent_encode;

use crate::canonical::{CanonicalRequest, Service};
use crate::config::Config;
use crate::constants::*;
use crate::sas::AccountSharedAccessSignature;
use crate::Credential;

/// RequestSigner that implements Shared Key and SAS authorization.
///
/// - [Authorize with Shared Key](https://learn.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key)
#[derive(Debug, Clone)]
pub struct RequestSigner {
    service: Service,
    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new signer for the blob service.
    pub fn new() -> Self {
        Self {
            service: Service::Blob,
            time: None,
        }
    }

    /// Create a signer for the service named in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new().with_service(config.service)
    }

    /// Sign for another storage service.
    pub fn with_service(mut self, service: Service) -> Self {
        self.service = service;
        self
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }
}

impl Default for RequestSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        credential: Option<&Self::Credential>,
        expires_in: Option<Duration>,
    ) -> Result<()> {
        let Some(cred) = credential else {
            return Err(Error::credential_invalid("credential is required"));
        };

        let method = match expires_in {
            Some(d) => SigningMethod::Query(d),
            None => SigningMethod::Header,
        };

        let mut ctx = SigningRequest::build(req)?;
        let now_time = self.time.unwrap_or_else(now);

        let mut sas_token = None;
        match (cred, method) {
            (Credential::SasToken { token }, _) => {
                sas_token = Some(token);
            }
            (Credential::SharedKey { .. }, SigningMethod::Query(d)) => {
                let expiry = now_time
                    + chrono::TimeDelta::from_std(d).map_err(|e| {
                        Error::argument_invalid("presign duration is out of range").with_source(e)
                    })?;
                let token = AccountSharedAccessSignature::new(expiry).token(cred)?;
                for (k, v) in token {
                    ctx.query_push(k, v);
                }
            }
            (Credential::SharedKey { .. }, SigningMethod::Header) => {
                ctx.headers
                    .insert(X_MS_DATE, format_http_date(now_time).parse()?);
                if !ctx.headers.contains_key(X_MS_VERSION) {
                    ctx.headers
                        .insert(X_MS_VERSION, HeaderValue::from_static(STORAGE_VERSION));
                }

                let canonical = CanonicalRequest::from_signing_request(&ctx)?;
                let mut value: HeaderValue =
                    authorization(self.service, &canonical, cred)?.parse()?;
                value.set_sensitive(true);
                ctx.headers.insert(header::AUTHORIZATION, value);
            }
        }

        // Pairs were decoded by `SigningRequest::build`, encode them back.
        for (k, v) in ctx.query.iter_mut() {
            *k = utf8_percent_encode(k, &STORAGE_QUERY_ENCODE_SET).to_string();
            *v = utf8_percent_encode(v, &STORAGE_QUERY_ENCODE_SET).to_string();
        }
        // The token is already encoded.
        if let Some(token) = sas_token {
            ctx.query_append(token);
        }

        ctx.apply(req)
    }
}

/// Compute the `Authorization` header value for a canonical request.
///
/// Returns `SharedKey {account}:{signature}`. SAS credentials cannot produce
/// an authorization header and fail with `CredentialInvalid`.
pub fn authorization(
    service: Service,
    canonical: &CanonicalRequest,
    cred: &Credential,
) -> Result<String> {
    let (account_name, account_key) = cred.shared_key()?;
    let string_to_sign = canonical.string_to_sign(service, account_name)?;
    debug!("calculated string to sign: {string_to_sign:?}");

    let signature = base64_hmac_sha256(account_key.as_bytes(), string_to_sign.as_bytes());
    Ok(format!("SharedKey {account_name}:{signature}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use azstore_core::time::parse_rfc3339;
    use azstore_core::ErrorKind;
    use http::Request;
    use pretty_assertions::assert_eq;

    fn test_time() -> DateTime {
        parse_rfc3339("2022-03-01T08:12:34Z").unwrap()
    }

    fn shared_key() -> Credential {
        Credential::with_shared_key("myaccount", "a2V5").unwrap()
    }

    #[tokio::test]
    async fn test_sign_with_shared_key() {
        let signer = RequestSigner::new().with_time(test_time());
        let ctx = Context::new();

        let req = Request::builder()
            .method(http::Method::GET)
            .uri("https://myaccount.blob.core.windows.net/mycontainer")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();

        signer
            .sign_request(&ctx, &mut parts, Some(&shared_key()), None)
            .await
            .unwrap();

        assert_eq!(
            parts.headers.get(X_MS_DATE).unwrap(),
            "Tue, 01 Mar 2022 08:12:34 GMT"
        );
        assert_eq!(parts.headers.get(X_MS_VERSION).unwrap(), STORAGE_VERSION);
        let auth = parts.headers.get(header::AUTHORIZATION).unwrap();
        assert!(auth.is_sensitive());
        assert_eq!(
            auth,
            "SharedKey myaccount:PqMH/dHXJ7pf0COEhYDYjg8ZHNSwTWeNJRvkgNaG3jc="
        );
    }

    #[tokio::test]
    async fn test_sign_keeps_query_encoded() {
        let signer = RequestSigner::new().with_time(test_time());
        let ctx = Context::new();

        let req = Request::builder()
            .method(http::Method::PUT)
            .uri("https://myaccount.blob.core.windows.net/c/b?comp=block&blockid=YQ%3D%3D")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();

        signer
            .sign_request(&ctx, &mut parts, Some(&shared_key()), None)
            .await
            .unwrap();

        assert_eq!(parts.uri.query(), Some("comp=block&blockid=YQ%3D%3D"));
    }

    #[tokio::test]
    async fn test_sign_keeps_query_keys_encoded() {
        let signer = RequestSigner::new().with_time(test_time());
        let ctx = Context::new();

        let req = Request::builder()
            .method(http::Method::GET)
            .uri("https://myaccount.blob.core.windows.net/c?x%26y=1&meta%3Dkey=a%20b")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();

        signer
            .sign_request(&ctx, &mut parts, Some(&shared_key()), None)
            .await
            .unwrap();
        assert_eq!(parts.uri.query(), Some("x%26y=1&meta%3Dkey=a%20b"));

        let cred = Credential::with_sas_token("sv=2016-05-31&sig=abc%3D").unwrap();
        let (mut parts, _) = Request::get("https://myaccount.blob.core.windows.net/c?x%26y=1")
            .body(())
            .unwrap()
            .into_parts();
        signer
            .sign_request(&ctx, &mut parts, Some(&cred), None)
            .await
            .unwrap();
        assert_eq!(parts.uri.query(), Some("x%26y=1&sv=2016-05-31&sig=abc%3D"));
    }

    #[tokio::test]
    async fn test_sign_with_sas_token() {
        let signer = RequestSigner::new();
        let ctx = Context::new();
        let cred = Credential::with_sas_token("?sv=2016-05-31&sr=c&sig=abc%3D").unwrap();

        let req = Request::builder()
            .method(http::Method::GET)
            .uri("https://myaccount.blob.core.windows.net/mycontainer?restype=container")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();

        signer
            .sign_request(&ctx, &mut parts, Some(&cred), None)
            .await
            .unwrap();

        assert_eq!(
            parts.uri.query(),
            Some("restype=container&sv=2016-05-31&sr=c&sig=abc%3D")
        );
        assert!(!parts.headers.contains_key(header::AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_presign_with_shared_key() {
        let signer = RequestSigner::new().with_time(test_time());
        let ctx = Context::new();
        let cred = Credential::with_shared_key("account", "a2V5").unwrap();

        let req = Request::builder()
            .method(http::Method::GET)
            .uri("https://account.blob.core.windows.net/c/b")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();

        signer
            .sign_request(&ctx, &mut parts, Some(&cred), Some(Duration::from_secs(300)))
            .await
            .unwrap();

        assert_eq!(
            parts.uri.query(),
            Some("sv=2016-05-31&ss=bqtf&srt=sco&se=2022-03-01T08%3A17%3A34Z&sp=rwdlacup&sig=hV42ftdL2jPMJ0x68FYmb3Q6IFFFJTlnWBxHiS7i0cU%3D")
        );
        assert!(!parts.headers.contains_key(header::AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_sign_without_credential() {
        let signer = RequestSigner::new();
        let (mut parts, _) = Request::get("https://a.blob.core.windows.net/c")
            .body(())
            .unwrap()
            .into_parts();

        let err = signer
            .sign_request(&Context::new(), &mut parts, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
    }

    #[tokio::test]
    async fn test_sign_for_table_service() {
        let config = Config {
            service: Service::Table,
            ..Config::new("https://myaccount.table.core.windows.net")
        };
        let signer = RequestSigner::from_config(&config).with_time(test_time());

        let (mut parts, _) = Request::get("https://myaccount.table.core.windows.net/mytable")
            .body(())
            .unwrap()
            .into_parts();
        signer
            .sign_request(&Context::new(), &mut parts, Some(&shared_key()), None)
            .await
            .unwrap();

        let canonical = CanonicalRequest::new(http::Method::GET, "/mytable")
            .unwrap()
            .with_header(X_MS_DATE, "Tue, 01 Mar 2022 08:12:34 GMT");
        let expected = authorization(Service::Table, &canonical, &shared_key()).unwrap();
        assert_eq!(parts.headers[header::AUTHORIZATION], expected.as_str());
    }

    #[test]
    fn test_authorization_rejects_sas() {
        let canonical = CanonicalRequest::new(http::Method::GET, "/c").unwrap();
        let cred = Credential::with_sas_token("sig=abc").unwrap();

        let err = authorization(Service::Blob, &canonical, &cred).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
    }
}

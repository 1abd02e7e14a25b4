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

use std::collections::HashMap;

use azstore_core::time::parse_rfc3339;
use azstore_core::{Context, ErrorKind, Signer, StaticEnv};
use azstore_storage::constants::*;
use azstore_storage::{
    authorization, canonicalize, AccountSharedAccessSignature, CanonicalRequest, Credential,
    EnvCredentialProvider, RequestSigner, SasResource, Service, ServiceSharedAccessSignature,
};
use http::Method;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_signer_with_env_credential() {
    let ctx = Context::new().with_env(StaticEnv {
        envs: HashMap::from([
            (AZURE_STORAGE_ACCOUNT_NAME.to_string(), "myaccount".to_string()),
            (AZURE_STORAGE_ACCOUNT_KEY.to_string(), "a2V5".to_string()),
        ]),
    });
    let signer = Signer::new(
        ctx,
        EnvCredentialProvider::new(),
        RequestSigner::new().with_time(parse_rfc3339("2022-03-01T08:12:34Z").unwrap()),
    );

    let mut parts = http::Request::get("https://myaccount.blob.core.windows.net/mycontainer")
        .body(())
        .unwrap()
        .into_parts()
        .0;
    signer.sign(&mut parts, None).await.unwrap();

    assert_eq!(
        parts.headers[http::header::AUTHORIZATION],
        "SharedKey myaccount:PqMH/dHXJ7pf0COEhYDYjg8ZHNSwTWeNJRvkgNaG3jc="
    );
}

#[tokio::test]
async fn test_signer_without_credential() {
    let signer = Signer::new(Context::new(), EnvCredentialProvider::new(), RequestSigner::new());

    let mut parts = http::Request::get("https://myaccount.blob.core.windows.net/c")
        .body(())
        .unwrap()
        .into_parts()
        .0;
    let err = signer.sign(&mut parts, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
}

#[test]
fn test_canonicalize_is_deterministic() {
    let headers = [
        ("x-ms-version", "2016-05-31"),
        ("x-ms-date", "Tue, 01 Mar 2022 08:12:34 GMT"),
        ("x-ms-blob-type", "BlockBlob"),
        ("content-type", "text/plain"),
        ("content-length", "11"),
    ];
    let query = [("timeout", "30")];

    let first = canonicalize(Method::PUT, "/c/b", &headers, &query, "acct").unwrap();
    let second = canonicalize(Method::PUT, "/c/b", &headers, &query, "acct").unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first,
        "PUT\n\n\n11\n\ntext/plain\n\n\n\n\n\n\nx-ms-blob-type:BlockBlob\nx-ms-date:Tue, 01 Mar 2022 08:12:34 GMT\nx-ms-version:2016-05-31\n/acct/c/b\ntimeout:30"
    );
}

#[test]
fn test_authorization_matches_signer() {
    let cred = Credential::with_shared_key("myaccount", "a2V5").unwrap();
    let canonical = CanonicalRequest::new(Method::GET, "/mycontainer")
        .unwrap()
        .with_header("x-ms-version", "2016-05-31")
        .with_header("x-ms-date", "Tue, 01 Mar 2022 08:12:34 GMT");

    assert_eq!(
        authorization(Service::Blob, &canonical, &cred).unwrap(),
        "SharedKey myaccount:PqMH/dHXJ7pf0COEhYDYjg8ZHNSwTWeNJRvkgNaG3jc="
    );
}

#[test]
fn test_sas_permissions_per_resource() {
    let cred = Credential::with_shared_key("myaccount", "a2V5").unwrap();
    let expiry = parse_rfc3339("2022-03-01T08:17:34Z").unwrap();

    let err = ServiceSharedAccessSignature::new(
        SasResource::Table {
            table: "mytable".to_string(),
        },
        "rwdx",
    )
    .with_expiry(expiry)
    .query_string(&cred)
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentInvalid);

    let token = ServiceSharedAccessSignature::new(
        SasResource::Container {
            container: "mycontainer".to_string(),
        },
        "rl",
    )
    .with_expiry(expiry)
    .with_ip("")
    .query_string(&cred)
    .unwrap();
    assert!(!token.contains("sip="));
    assert!(token.starts_with("sv=2016-05-31&sr=c&se=2022-03-01T08%3A17%3A34Z&sp=rl&sig="));
}

#[test]
fn test_account_sas_requires_shared_key() {
    let expiry = parse_rfc3339("2022-03-01T08:17:34Z").unwrap();
    let cred = Credential::with_sas_token("sv=2016-05-31&sig=abc").unwrap();

    let err = AccountSharedAccessSignature::new(expiry)
        .query_string(&cred)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
}

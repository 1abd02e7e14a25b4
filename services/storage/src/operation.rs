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

use std::fmt::Write;

use azstore_core::{Error, Result};
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{Method, Request, StatusCode};
use percent_encoding::utf8_percent_encode;

use crate::constants::STORAGE_QUERY_ENCODE_SET;

const DEFAULT_EXPECTED_STATUS: [StatusCode; 5] = [
    StatusCode::OK,
    StatusCode::CREATED,
    StatusCode::ACCEPTED,
    StatusCode::NO_CONTENT,
    StatusCode::PARTIAL_CONTENT,
];

/// One logical request against a storage account, not yet addressed or signed.
///
/// The executor turns an operation into a fresh `http::Request` for every
/// attempt, so retries against another endpoint are signed anew.
#[derive(Debug, Clone)]
pub struct Operation {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Bytes,
    expected_status: Vec<StatusCode>,
}

impl Operation {
    /// Create an operation for an absolute, path-encoded resource.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Bytes::new(),
            expected_status: DEFAULT_EXPECTED_STATUS.to_vec(),
        }
    }

    /// Add a query parameter, the value is encoded when the request is built.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Replace the set of statuses that count as success.
    pub fn with_expected_status(mut self, expected: &[StatusCode]) -> Self {
        self.expected_status = expected.to_vec();
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Resource path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Value of the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first query parameter named `name`.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Reads may be retried against the secondary endpoint.
    pub fn is_idempotent(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Whether `status` counts as success.
    pub fn is_expected(&self, status: StatusCode) -> bool {
        self.expected_status.contains(&status)
    }

    /// Build an unsigned request addressed at `endpoint`.
    pub fn to_request(&self, endpoint: &str) -> Result<Request<Bytes>> {
        if !self.path.starts_with('/') {
            return Err(Error::request_invalid(format!(
                "resource path must be absolute, got {:?}",
                self.path
            )));
        }

        let mut uri = String::with_capacity(endpoint.len() + self.path.len() + 64);
        uri.push_str(endpoint.trim_end_matches('/'));
        uri.push_str(&self.path);
        for (i, (k, v)) in self.query.iter().enumerate() {
            uri.push(if i == 0 { '?' } else { '&' });
            write!(
                uri,
                "{}={}",
                utf8_percent_encode(k, &STORAGE_QUERY_ENCODE_SET),
                utf8_percent_encode(v, &STORAGE_QUERY_ENCODE_SET)
            )?;
        }

        let mut builder = Request::builder().method(self.method.clone()).uri(uri);
        for (k, v) in self.headers.iter() {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if !self.body.is_empty() || matches!(self.method, Method::PUT | Method::POST) {
            builder = builder.header(CONTENT_LENGTH, self.body.len());
        }

        builder
            .body(self.body.clone())
            .map_err(|e| Error::request_invalid("failed to build request").with_source(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azstore_core::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_to_request() {
        let op = Operation::new(Method::PUT, "/c/my%20blob")
            .with_query("comp", "block")
            .with_query("blockid", "MDAwMDA=")
            .with_header("x-ms-meta-owner", "me")
            .with_body(Bytes::from_static(b"hello"));

        let req = op.to_request("https://acct.blob.core.windows.net/").unwrap();

        assert_eq!(
            req.uri(),
            "https://acct.blob.core.windows.net/c/my%20blob?comp=block&blockid=MDAwMDA%3D"
        );
        assert_eq!(req.headers()["x-ms-meta-owner"], "me");
        assert_eq!(req.headers()[CONTENT_LENGTH], "5");
        assert_eq!(req.body().as_ref(), b"hello");
    }

    #[test]
    fn test_empty_put_has_content_length() {
        let req = Operation::new(Method::PUT, "/c")
            .with_query("restype", "container")
            .to_request("https://acct.blob.core.windows.net")
            .unwrap();
        assert_eq!(req.headers()[CONTENT_LENGTH], "0");

        let req = Operation::new(Method::GET, "/c")
            .to_request("https://acct.blob.core.windows.net")
            .unwrap();
        assert!(!req.headers().contains_key(CONTENT_LENGTH));
    }

    #[test]
    fn test_relative_path_rejected() {
        let err = Operation::new(Method::GET, "c/b")
            .to_request("https://acct.blob.core.windows.net")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestInvalid);
    }

    #[test]
    fn test_expected_status() {
        let op = Operation::new(Method::GET, "/c/b");
        assert!(op.is_idempotent());
        assert!(op.is_expected(StatusCode::PARTIAL_CONTENT));
        assert!(!op.is_expected(StatusCode::NOT_MODIFIED));

        let op = Operation::new(Method::PUT, "/c/b").with_expected_status(&[StatusCode::CREATED]);
        assert!(!op.is_idempotent());
        assert!(!op.is_expected(StatusCode::OK));
    }
}

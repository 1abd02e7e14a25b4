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

//! Canonicalized request construction for Shared Key authorization.

use std::collections::BTreeMap;
use std::fmt::Write;

use azstore_core::{Error, Result, SigningRequest};
use http::Method;

use crate::constants::{CONTENT_MD5, X_MS_DATE};

/// Storage service a request is addressed to.
///
/// Blob, file and queue share one string-to-sign layout, table uses its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    /// Blob service.
    #[default]
    Blob,
    /// File share service.
    File,
    /// Queue service.
    Queue,
    /// Table service.
    Table,
}

/// Standard headers in the order they appear in the string to sign.
const STANDARD_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-language",
    "content-length",
    CONTENT_MD5,
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

/// The parts of a request that participate in the Shared Key signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: Method,
    resource_path: String,
    headers: BTreeMap<String, String>,
    query: Vec<(String, String)>,
}

impl CanonicalRequest {
    /// Create a canonical request for an absolute, already path-encoded resource.
    pub fn new(method: Method, resource_path: impl Into<String>) -> Result<Self> {
        let resource_path = resource_path.into();
        if !resource_path.starts_with('/') {
            return Err(Error::request_invalid(format!(
                "resource path must be absolute, got {resource_path:?}"
            )));
        }

        Ok(Self {
            method,
            resource_path,
            headers: BTreeMap::new(),
            query: Vec::new(),
        })
    }

    /// Add a header. The name is lower-cased, repeated names are comma-joined.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let value = value.trim();
        self.headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|v| {
                v.push(',');
                v.push_str(value);
            })
            .or_insert_with(|| value.to_string());
        self
    }

    /// Add a percent-decoded query parameter.
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Build from a request that is being signed.
    pub fn from_signing_request(req: &SigningRequest) -> Result<Self> {
        let mut canonical = Self::new(req.method.clone(), req.path.clone())?;
        for (k, v) in req.header_to_vec()? {
            canonical = canonical.with_header(&k, &v);
        }
        canonical.query = req.query.clone();
        Ok(canonical)
    }

    /// HTTP method of the request.
    pub fn method(&self) -> &Method {
        &self.method
    }

    fn header(&self, name: &str) -> &str {
        self.headers.get(name).map(String::as_str).unwrap_or("")
    }

    /// Build the string to sign for the given service.
    ///
    /// ## Reference
    ///
    /// - [Authorize with Shared Key](https://learn.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key)
    pub fn string_to_sign(&self, service: Service, account_name: &str) -> Result<String> {
        if account_name.is_empty() {
            return Err(Error::request_invalid(
                "account name is required to build the canonicalized resource",
            ));
        }

        match service {
            Service::Table => self.table_string_to_sign(account_name),
            Service::Blob | Service::File | Service::Queue => {
                self.blob_string_to_sign(account_name)
            }
        }
    }

    /// ## Format
    ///
    /// ```text
    /// VERB + "\n" +
    /// Content-Encoding + "\n" +
    /// Content-Language + "\n" +
    /// Content-Length + "\n" +
    /// Content-MD5 + "\n" +
    /// Content-Type + "\n" +
    /// Date + "\n" +
    /// If-Modified-Since + "\n" +
    /// If-Match + "\n" +
    /// If-None-Match + "\n" +
    /// If-Unmodified-Since + "\n" +
    /// Range + "\n" +
    /// CanonicalizedHeaders +
    /// CanonicalizedResource;
    /// ```
    fn blob_string_to_sign(&self, account_name: &str) -> Result<String> {
        let mut s = String::with_capacity(256);

        writeln!(&mut s, "{}", self.method.as_str())?;
        for name in STANDARD_HEADERS {
            let value = self.header(name);
            // Since 2015-02-21 a zero content length is signed as empty.
            if name == "content-length" && value == "0" {
                writeln!(&mut s)?;
            } else {
                writeln!(&mut s, "{value}")?;
            }
        }
        s.push_str(&self.canonicalized_headers());
        s.push_str(&self.canonicalized_resource(account_name));

        Ok(s)
    }

    /// ## Format
    ///
    /// ```text
    /// VERB + "\n" +
    /// Content-MD5 + "\n" +
    /// Content-Type + "\n" +
    /// Date + "\n" +
    /// CanonicalizedResource;
    /// ```
    fn table_string_to_sign(&self, account_name: &str) -> Result<String> {
        let mut s = String::with_capacity(128);

        writeln!(&mut s, "{}", self.method.as_str())?;
        writeln!(&mut s, "{}", self.header(CONTENT_MD5))?;
        writeln!(&mut s, "{}", self.header("content-type"))?;
        let date = match self.header(X_MS_DATE) {
            "" => self.header("date"),
            v => v,
        };
        writeln!(&mut s, "{date}")?;
        write!(&mut s, "/{account_name}{}", self.resource_path)?;
        let comp = self
            .query
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("comp"));
        if let Some((_, comp)) = comp {
            write!(&mut s, "?comp={comp}")?;
        }

        Ok(s)
    }

    /// `x-ms-*` headers sorted by name, each rendered as `name:value\n`.
    ///
    /// Headers with an empty value are left out.
    fn canonicalized_headers(&self) -> String {
        let mut s = String::with_capacity(128);
        // BTreeMap keeps names sorted.
        for (k, v) in self.headers.iter() {
            if k.starts_with("x-ms-") && !v.is_empty() {
                s.push_str(k);
                s.push(':');
                s.push_str(v);
                s.push('\n');
            }
        }
        s
    }

    /// `/{account}{path}` followed by `\nname:v1,v2` for each query name.
    fn canonicalized_resource(&self, account_name: &str) -> String {
        let mut query: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for (k, v) in self.query.iter() {
            query.entry(k.to_lowercase()).or_default().push(v);
        }

        let mut s = format!("/{account_name}{}", self.resource_path);
        for (k, mut values) in query {
            values.sort_unstable();
            s.push('\n');
            s.push_str(&k);
            s.push(':');
            s.push_str(&values.join(","));
        }
        s
    }
}

/// Build the string to sign for a blob, file or queue request.
///
/// `headers` are the headers that take part in the signature, `query` the
/// percent-decoded query parameters.
pub fn canonicalize(
    method: Method,
    resource_path: &str,
    headers: &[(&str, &str)],
    query: &[(&str, &str)],
    account_name: &str,
) -> Result<String> {
    let mut req = CanonicalRequest::new(method, resource_path)?;
    for (k, v) in headers {
        req = req.with_header(k, v);
    }
    for (k, v) in query {
        req = req.with_query(k, v);
    }
    req.string_to_sign(Service::Blob, account_name)
}

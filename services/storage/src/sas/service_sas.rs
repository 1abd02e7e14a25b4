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

use azstore_core::hash;
use azstore_core::time;
use azstore_core::time::DateTime;
use azstore_core::{Error, Result};

use super::{normalize_letters, to_query_string, validate_protocol};
use crate::constants::{MAX_SIGNED_IDENTIFIER_LEN, STORAGE_VERSION};
use crate::Credential;

/// The resource a service SAS grants access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SasResource {
    /// A single blob, `sr=b`.
    Blob {
        /// Container name.
        container: String,
        /// Blob name, unencoded.
        blob: String,
    },
    /// A container and every blob in it, `sr=c`.
    Container {
        /// Container name.
        container: String,
    },
    /// A single file, `sr=f`.
    File {
        /// Share name.
        share: String,
        /// File path inside the share, unencoded.
        path: String,
    },
    /// A file share, `sr=s`.
    Share {
        /// Share name.
        share: String,
    },
    /// A table, `tn=`.
    Table {
        /// Table name.
        table: String,
    },
}

impl SasResource {
    /// Letters allowed in `sp`, in the order the service expects them.
    fn legal_permissions(&self) -> &'static str {
        match self {
            SasResource::Blob { .. } => "racwd",
            SasResource::Container { .. } => "racwdl",
            SasResource::File { .. } => "rcwd",
            SasResource::Share { .. } => "rcwdl",
            SasResource::Table { .. } => "raud",
        }
    }

    fn is_table(&self) -> bool {
        matches!(self, SasResource::Table { .. })
    }

    /// Name and value of the parameter naming the resource.
    fn resource_param(&self) -> (&'static str, String) {
        match self {
            SasResource::Blob { .. } => ("sr", "b".to_string()),
            SasResource::Container { .. } => ("sr", "c".to_string()),
            SasResource::File { .. } => ("sr", "f".to_string()),
            SasResource::Share { .. } => ("sr", "s".to_string()),
            SasResource::Table { table } => ("tn", table.clone()),
        }
    }

    fn canonical_resource(&self, account_name: &str) -> String {
        let path = |s: &str| s.trim_start_matches('/').to_string();
        match self {
            SasResource::Blob { container, blob } => {
                format!("/blob/{account_name}/{container}/{}", path(blob))
            }
            SasResource::Container { container } => format!("/blob/{account_name}/{container}"),
            SasResource::File { share, path: p } => {
                format!("/file/{account_name}/{share}/{}", path(p))
            }
            SasResource::Share { share } => format!("/file/{account_name}/{share}"),
            SasResource::Table { table } => {
                format!("/table/{account_name}/{}", table.to_lowercase())
            }
        }
    }
}

/// Service SAS for a blob, container, file, share or table.
///
/// - [Create a service SAS](https://learn.microsoft.com/en-us/rest/api/storageservices/create-service-sas)
#[derive(Debug, Clone)]
pub struct ServiceSharedAccessSignature {
    resource: SasResource,
    permissions: String,
    version: String,
    expiry: Option<DateTime>,
    start: Option<DateTime>,
    ip: String,
    protocol: String,
    identifier: String,

    cache_control: String,
    content_disposition: String,
    content_encoding: String,
    content_language: String,
    content_type: String,

    start_partition_key: String,
    start_row_key: String,
    end_partition_key: String,
    end_row_key: String,
}

impl ServiceSharedAccessSignature {
    /// Create a SAS for `resource` with the given permission letters.
    pub fn new(resource: SasResource, permissions: &str) -> Self {
        Self {
            resource,
            permissions: permissions.to_string(),
            version: STORAGE_VERSION.to_string(),
            expiry: None,
            start: None,
            ip: String::new(),
            protocol: String::new(),
            identifier: String::new(),
            cache_control: String::new(),
            content_disposition: String::new(),
            content_encoding: String::new(),
            content_language: String::new(),
            content_type: String::new(),
            start_partition_key: String::new(),
            start_row_key: String::new(),
            end_partition_key: String::new(),
            end_row_key: String::new(),
        }
    }

    /// Set the expiry time, required unless a stored access policy is referenced.
    pub fn with_expiry(mut self, expiry: DateTime) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Set the time the token becomes valid.
    pub fn with_start(mut self, start: DateTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Restrict the token to an IP or IP range.
    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip = ip.to_string();
        self
    }

    /// Restrict the token to `https` or `https,http`.
    pub fn with_protocol(mut self, protocol: &str) -> Self {
        self.protocol = protocol.to_string();
        self
    }

    /// Reference a stored access policy.
    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifier = identifier.to_string();
        self
    }

    /// Override the signed service version.
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Override `Cache-Control` on responses, blob and file only.
    pub fn with_cache_control(mut self, v: &str) -> Self {
        self.cache_control = v.to_string();
        self
    }

    /// Override `Content-Disposition` on responses, blob and file only.
    pub fn with_content_disposition(mut self, v: &str) -> Self {
        self.content_disposition = v.to_string();
        self
    }

    /// Override `Content-Encoding` on responses, blob and file only.
    pub fn with_content_encoding(mut self, v: &str) -> Self {
        self.content_encoding = v.to_string();
        self
    }

    /// Override `Content-Language` on responses, blob and file only.
    pub fn with_content_language(mut self, v: &str) -> Self {
        self.content_language = v.to_string();
        self
    }

    /// Override `Content-Type` on responses, blob and file only.
    pub fn with_content_type(mut self, v: &str) -> Self {
        self.content_type = v.to_string();
        self
    }

    /// Limit a table SAS to a partition key range.
    pub fn with_partition_key_range(mut self, start: &str, end: &str) -> Self {
        self.start_partition_key = start.to_string();
        self.end_partition_key = end.to_string();
        self
    }

    /// Limit a table SAS to a row key range.
    pub fn with_row_key_range(mut self, start: &str, end: &str) -> Self {
        self.start_row_key = start.to_string();
        self.end_row_key = end.to_string();
        self
    }

    fn validate(&self) -> Result<String> {
        let permissions = if self.permissions.is_empty() && !self.identifier.is_empty() {
            String::new()
        } else {
            normalize_letters(
                "permissions",
                &self.permissions,
                self.resource.legal_permissions(),
            )?
        };

        if self.identifier.chars().count() > MAX_SIGNED_IDENTIFIER_LEN {
            return Err(Error::argument_invalid(format!(
                "signed identifier must be at most {MAX_SIGNED_IDENTIFIER_LEN} characters"
            )));
        }
        if self.expiry.is_none() && self.identifier.is_empty() {
            return Err(Error::argument_invalid(
                "expiry is required when no signed identifier is given",
            ));
        }
        validate_protocol(&self.protocol)?;

        let has_overrides = [
            &self.cache_control,
            &self.content_disposition,
            &self.content_encoding,
            &self.content_language,
            &self.content_type,
        ]
        .iter()
        .any(|v| !v.is_empty());
        let has_key_range = [
            &self.start_partition_key,
            &self.start_row_key,
            &self.end_partition_key,
            &self.end_row_key,
        ]
        .iter()
        .any(|v| !v.is_empty());
        if self.resource.is_table() && has_overrides {
            return Err(Error::argument_invalid(
                "response header overrides are not supported for table sas",
            ));
        }
        if !self.resource.is_table() && has_key_range {
            return Err(Error::argument_invalid(
                "partition and row key ranges are only supported for table sas",
            ));
        }

        Ok(permissions)
    }

    /// Generate the token as `(name, value)` pairs with unencoded values.
    ///
    /// Arguments are validated before anything is signed. Empty optional
    /// fields are left out of the result.
    pub fn token(&self, cred: &Credential) -> Result<Vec<(String, String)>> {
        let permissions = self.validate()?;
        let (account_name, account_key) = cred.shared_key()?;

        let start = self.start.map(time::format_rfc3339).unwrap_or_default();
        let expiry = self.expiry.map(time::format_rfc3339).unwrap_or_default();
        let canonical_resource = self.resource.canonical_resource(account_name);

        let mut fields = vec![
            permissions.as_str(),
            start.as_str(),
            expiry.as_str(),
            canonical_resource.as_str(),
            self.identifier.as_str(),
            self.ip.as_str(),
            self.protocol.as_str(),
            self.version.as_str(),
        ];
        if self.resource.is_table() {
            fields.extend([
                self.start_partition_key.as_str(),
                self.start_row_key.as_str(),
                self.end_partition_key.as_str(),
                self.end_row_key.as_str(),
            ]);
        } else {
            fields.extend([
                self.cache_control.as_str(),
                self.content_disposition.as_str(),
                self.content_encoding.as_str(),
                self.content_language.as_str(),
                self.content_type.as_str(),
            ]);
        }
        let string_to_sign = fields.join("\n");
        let sig = hash::base64_hmac_sha256(account_key.as_bytes(), string_to_sign.as_bytes());

        let (resource_key, resource_value) = self.resource.resource_param();
        let elements = vec![
            ("sv", self.version.clone()),
            (resource_key, resource_value),
            ("st", start),
            ("se", expiry),
            ("sp", permissions),
            ("sip", self.ip.clone()),
            ("spr", self.protocol.clone()),
            ("si", self.identifier.clone()),
            ("rscc", self.cache_control.clone()),
            ("rscd", self.content_disposition.clone()),
            ("rsce", self.content_encoding.clone()),
            ("rscl", self.content_language.clone()),
            ("rsct", self.content_type.clone()),
            ("spk", self.start_partition_key.clone()),
            ("srk", self.start_row_key.clone()),
            ("epk", self.end_partition_key.clone()),
            ("erk", self.end_row_key.clone()),
            ("sig", sig),
        ];

        Ok(elements
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.to_string(), v))
            .collect())
    }

    /// Generate the token as an encoded query string.
    pub fn query_string(&self, cred: &Credential) -> Result<String> {
        Ok(to_query_string(&self.token(cred)?))
    }
}

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
use azstore_core::Result;

use super::{normalize_letters, to_query_string, validate_protocol};
use crate::constants::STORAGE_VERSION;
use crate::Credential;

/// The default parameters that make up an account SAS token
/// https://learn.microsoft.com/en-us/rest/api/storageservices/create-account-sas#specify-the-account-sas-parameters
const ACCOUNT_SAS_SERVICES: &str = "bqtf";
const ACCOUNT_SAS_RESOURCE_TYPES: &str = "sco";
const ACCOUNT_SAS_PERMISSIONS: &str = "rwdlacup";

/// Account SAS, granting access across services of one account.
///
/// Used to presign requests signed with a shared key.
#[derive(Debug, Clone)]
pub struct AccountSharedAccessSignature {
    version: String,
    services: String,
    resource_types: String,
    permissions: String,
    expiry: DateTime,
    start: Option<DateTime>,
    ip: String,
    protocol: String,
}

impl AccountSharedAccessSignature {
    /// Create an account SAS with full permissions on every service.
    pub fn new(expiry: DateTime) -> Self {
        Self {
            expiry,
            start: None,
            ip: String::new(),
            protocol: String::new(),
            version: STORAGE_VERSION.to_string(),
            services: ACCOUNT_SAS_SERVICES.to_string(),
            resource_types: ACCOUNT_SAS_RESOURCE_TYPES.to_string(),
            permissions: ACCOUNT_SAS_PERMISSIONS.to_string(),
        }
    }

    /// Restrict services, a subset of `bqtf`.
    pub fn with_services(mut self, services: &str) -> Self {
        self.services = services.to_string();
        self
    }

    /// Restrict resource types, a subset of `sco`.
    pub fn with_resource_types(mut self, resource_types: &str) -> Self {
        self.resource_types = resource_types.to_string();
        self
    }

    /// Restrict permissions, a subset of `rwdlacup`.
    pub fn with_permissions(mut self, permissions: &str) -> Self {
        self.permissions = permissions.to_string();
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

    /// Generate the token as `(name, value)` pairs with unencoded values.
    ///
    /// Empty optional fields are left out.
    ///
    /// [Example](https://learn.microsoft.com/en-us/rest/api/storageservices/create-account-sas#account-sas-example) from Azure documentation.
    pub fn token(&self, cred: &Credential) -> Result<Vec<(String, String)>> {
        let services =
            normalize_letters("signed services", &self.services, ACCOUNT_SAS_SERVICES)?;
        let resource_types = normalize_letters(
            "signed resource types",
            &self.resource_types,
            ACCOUNT_SAS_RESOURCE_TYPES,
        )?;
        let permissions =
            normalize_letters("permissions", &self.permissions, ACCOUNT_SAS_PERMISSIONS)?;
        validate_protocol(&self.protocol)?;
        let (account_name, account_key) = cred.shared_key()?;

        let start = self.start.map(time::format_rfc3339).unwrap_or_default();
        let expiry = time::format_rfc3339(self.expiry);

        // https://learn.microsoft.com/en-us/rest/api/storageservices/create-account-sas#construct-the-signature-string
        let string_to_sign = format!(
            "{account_name}\n{permissions}\n{services}\n{resource_types}\n{start}\n{expiry}\n{}\n{}\n{}\n",
            self.ip, self.protocol, self.version,
        );
        let sig = hash::base64_hmac_sha256(account_key.as_bytes(), string_to_sign.as_bytes());

        let elements = vec![
            ("sv".to_string(), self.version.clone()),
            ("ss".to_string(), services),
            ("srt".to_string(), resource_types),
            ("se".to_string(), expiry),
            ("sp".to_string(), permissions),
            ("st".to_string(), start),
            ("sip".to_string(), self.ip.clone()),
            ("spr".to_string(), self.protocol.clone()),
            ("sig".to_string(), sig),
        ];

        Ok(elements.into_iter().filter(|(_, v)| !v.is_empty()).collect())
    }

    /// Generate the token as an encoded query string.
    pub fn query_string(&self, cred: &Credential) -> Result<String> {
        Ok(to_query_string(&self.token(cred)?))
    }
}

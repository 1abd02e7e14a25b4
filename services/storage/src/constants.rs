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

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

// Headers used in storage services.
pub const X_MS_DATE: &str = "x-ms-date";
pub const X_MS_VERSION: &str = "x-ms-version";
pub const X_MS_RANGE: &str = "x-ms-range";
pub const X_MS_PAGE_WRITE: &str = "x-ms-page-write";
pub const X_MS_WRITE: &str = "x-ms-write";
pub const CONTENT_MD5: &str = "content-md5";

/// Service version sent with every request and used for SAS tokens.
pub const STORAGE_VERSION: &str = "2016-05-31";

/// Default size of one upload window.
pub const DEFAULT_CHUNK_SIZE: u32 = 4 * 1024 * 1024;
/// Default number of windows in flight during a chunked upload.
pub const DEFAULT_CONCURRENCY: usize = 25;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_RETRY_INTERVAL_MS: u64 = 120_000;

/// Page blob writes must be aligned to this many bytes.
pub const PAGE_SIZE: u64 = 512;

/// Longest signed identifier accepted for a SAS token.
pub const MAX_SIGNED_IDENTIFIER_LEN: usize = 64;

// Env values used to configure azstore.
pub const AZSTORE_ENDPOINT: &str = "AZSTORE_ENDPOINT";
pub const AZSTORE_SECONDARY_ENDPOINT: &str = "AZSTORE_SECONDARY_ENDPOINT";
pub const AZSTORE_CONCURRENCY: &str = "AZSTORE_CONCURRENCY";
pub const AZSTORE_MAX_RETRIES: &str = "AZSTORE_MAX_RETRIES";
pub const AZSTORE_RETRY_INTERVAL_MS: &str = "AZSTORE_RETRY_INTERVAL_MS";
pub const AZSTORE_MAX_RETRY_INTERVAL_MS: &str = "AZSTORE_MAX_RETRY_INTERVAL_MS";
pub const AZSTORE_MAX_RETRY_ELAPSED_MS: &str = "AZSTORE_MAX_RETRY_ELAPSED_MS";
pub const AZSTORE_LOCATION_MODE: &str = "AZSTORE_LOCATION_MODE";
pub const AZSTORE_CHUNK_SIZE: &str = "AZSTORE_CHUNK_SIZE";
pub const AZURE_STORAGE_ACCOUNT_NAME: &str = "AZURE_STORAGE_ACCOUNT_NAME";
pub const AZURE_STORAGE_ACCOUNT_KEY: &str = "AZURE_STORAGE_ACCOUNT_KEY";
pub const AZURE_STORAGE_SAS_TOKEN: &str = "AZURE_STORAGE_SAS_TOKEN";

/// AsciiSet for query values.
///
/// Everything except unreserved characters is encoded.
pub static STORAGE_QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

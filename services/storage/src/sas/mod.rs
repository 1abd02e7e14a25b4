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

//! Shared Access Signature generation.

mod account_sas;
pub use account_sas::AccountSharedAccessSignature;

mod service_sas;
pub use service_sas::SasResource;
pub use service_sas::ServiceSharedAccessSignature;

use azstore_core::{Error, Result};
use percent_encoding::utf8_percent_encode;

use crate::constants::STORAGE_QUERY_ENCODE_SET;

/// Keep only the letters of `input` that appear in `legal`, in `legal`'s order.
///
/// Any letter outside `legal` is rejected. Duplicates collapse into one.
pub(crate) fn normalize_letters(what: &str, input: &str, legal: &str) -> Result<String> {
    if input.is_empty() {
        return Err(Error::argument_invalid(format!("{what} must not be empty")));
    }
    if let Some(c) = input.chars().find(|c| !legal.contains(*c)) {
        return Err(Error::argument_invalid(format!(
            "{what} {input:?} contains {c:?}, allowed letters are {legal:?}"
        )));
    }

    Ok(legal.chars().filter(|c| input.contains(*c)).collect())
}

/// Only `https` and `https,http` are valid signed protocols.
pub(crate) fn validate_protocol(protocol: &str) -> Result<()> {
    match protocol {
        "" | "https" | "https,http" => Ok(()),
        v => Err(Error::argument_invalid(format!(
            "signed protocol must be https or https,http, got {v:?}"
        ))),
    }
}

/// Render `(key, value)` pairs as a query string, skipping empty values.
pub(crate) fn to_query_string(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={}", urlencoded(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn urlencoded(s: &str) -> String {
    utf8_percent_encode(s, &STORAGE_QUERY_ENCODE_SET).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use azstore_core::ErrorKind;
    use test_case::test_case;

    #[test_case("rwdl", "racwdl", "rwdl"; "already ordered")]
    #[test_case("lwr", "racwdl", "rwl"; "reordered")]
    #[test_case("rrw", "racwdl", "rw"; "duplicates")]
    fn test_normalize_letters(input: &str, legal: &str, expected: &str) {
        assert_eq!(normalize_letters("permissions", input, legal).unwrap(), expected);
    }

    #[test_case("rwdx", "raud"; "table rejects w and x")]
    #[test_case("l", "racwd"; "blob rejects list")]
    #[test_case("", "racwd"; "empty")]
    fn test_normalize_letters_rejects(input: &str, legal: &str) {
        let err = normalize_letters("permissions", input, legal).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentInvalid);
    }

    #[test]
    fn test_to_query_string_skips_empty() {
        let pairs = vec![
            ("sv".to_string(), "2016-05-31".to_string()),
            ("sip".to_string(), "".to_string()),
            ("sig".to_string(), "a+b/c=".to_string()),
        ];
        assert_eq!(to_query_string(&pairs), "sv=2016-05-31&sig=a%2Bb%2Fc%3D");
    }
}

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

use std::str::FromStr;
use std::time::Duration;

use azstore_core::{Context, Error, Result};
use http::Uri;
use serde::Deserialize;

use crate::canonical::Service;
use crate::constants::*;
use crate::retry::{LocationMode, RetryPolicy};

/// Config carries everything the executor and the chunked uploader need.
///
/// Fields left out of a deserialized config take their default value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Primary endpoint, for example `https://myaccount.blob.core.windows.net`.
    ///
    /// - env value: [`AZSTORE_ENDPOINT`]
    pub endpoint: String,
    /// Geo-replicated read endpoint.
    ///
    /// - env value: [`AZSTORE_SECONDARY_ENDPOINT`]
    pub secondary_endpoint: Option<String>,
    /// Windows in flight during a chunked upload.
    ///
    /// - env value: [`AZSTORE_CONCURRENCY`]
    pub number_of_concurrency: usize,
    /// Retries after the first attempt.
    ///
    /// - env value: [`AZSTORE_MAX_RETRIES`]
    pub max_retries: u32,
    /// Delay before the first retry.
    ///
    /// - env value: [`AZSTORE_RETRY_INTERVAL_MS`]
    pub base_retry_interval_ms: u64,
    /// Cap for a single retry delay.
    ///
    /// - env value: [`AZSTORE_MAX_RETRY_INTERVAL_MS`]
    pub max_retry_interval_ms: u64,
    /// Stop retrying once this long has passed since the first attempt.
    ///
    /// Unset means only `max_retries` limits retries.
    ///
    /// - env value: [`AZSTORE_MAX_RETRY_ELAPSED_MS`]
    pub max_retry_elapsed_ms: Option<u64>,
    /// - env value: [`AZSTORE_LOCATION_MODE`]
    pub location_mode: LocationMode,
    /// Size of one upload window.
    ///
    /// - env value: [`AZSTORE_CHUNK_SIZE`]
    pub chunk_size: u32,
    /// Service the endpoint belongs to, selects the string to sign layout.
    pub service: Service,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            secondary_endpoint: None,
            number_of_concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            base_retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            max_retry_interval_ms: DEFAULT_MAX_RETRY_INTERVAL_MS,
            max_retry_elapsed_ms: None,
            location_mode: LocationMode::PrimaryOnly,
            chunk_size: DEFAULT_CHUNK_SIZE,
            service: Service::Blob,
        }
    }
}

impl Config {
    /// Create a config for the given primary endpoint.
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    /// Overlay values found in the environment.
    ///
    /// Malformed numbers fail with `ConfigInvalid` instead of being ignored.
    pub fn from_env(mut self, ctx: &Context) -> Result<Self> {
        let envs = ctx.env_vars();

        if let Some(v) = envs.get(AZSTORE_ENDPOINT) {
            self.endpoint = v.to_string();
        }
        if let Some(v) = envs.get(AZSTORE_SECONDARY_ENDPOINT) {
            self.secondary_endpoint = Some(v.to_string());
        }
        if let Some(v) = envs.get(AZSTORE_CONCURRENCY) {
            self.number_of_concurrency = parse_env(AZSTORE_CONCURRENCY, v)?;
        }
        if let Some(v) = envs.get(AZSTORE_MAX_RETRIES) {
            self.max_retries = parse_env(AZSTORE_MAX_RETRIES, v)?;
        }
        if let Some(v) = envs.get(AZSTORE_RETRY_INTERVAL_MS) {
            self.base_retry_interval_ms = parse_env(AZSTORE_RETRY_INTERVAL_MS, v)?;
        }
        if let Some(v) = envs.get(AZSTORE_MAX_RETRY_INTERVAL_MS) {
            self.max_retry_interval_ms = parse_env(AZSTORE_MAX_RETRY_INTERVAL_MS, v)?;
        }
        if let Some(v) = envs.get(AZSTORE_MAX_RETRY_ELAPSED_MS) {
            self.max_retry_elapsed_ms = Some(parse_env(AZSTORE_MAX_RETRY_ELAPSED_MS, v)?);
        }
        if let Some(v) = envs.get(AZSTORE_LOCATION_MODE) {
            self.location_mode = v.parse()?;
        }
        if let Some(v) = envs.get(AZSTORE_CHUNK_SIZE) {
            self.chunk_size = parse_env(AZSTORE_CHUNK_SIZE, v)?;
        }

        Ok(self)
    }

    /// Check that the config can drive requests.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_concurrency == 0 {
            return Err(Error::config_invalid("number_of_concurrency must be positive"));
        }
        if self.chunk_size == 0 {
            return Err(Error::config_invalid("chunk_size must be positive"));
        }
        validate_endpoint("endpoint", &self.endpoint)?;
        match &self.secondary_endpoint {
            Some(v) => validate_endpoint("secondary_endpoint", v)?,
            None if self.location_mode.uses_secondary() => {
                return Err(Error::config_invalid(format!(
                    "location mode {:?} requires a secondary_endpoint",
                    self.location_mode
                )));
            }
            None => {}
        }

        Ok(())
    }

    /// Build the retry policy described by this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new()
            .with_max_retries(self.max_retries)
            .with_base_interval(Duration::from_millis(self.base_retry_interval_ms))
            .with_max_interval(Duration::from_millis(self.max_retry_interval_ms))
            .with_location_mode(self.location_mode, self.secondary_endpoint.is_some());

        match self.max_retry_elapsed_ms {
            Some(ms) => policy.with_max_elapsed(Duration::from_millis(ms)),
            None => policy,
        }
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config_invalid(format!("{key} has invalid value {value:?}")))
}

fn validate_endpoint(name: &str, endpoint: &str) -> Result<()> {
    if endpoint.is_empty() {
        return Err(Error::config_invalid(format!("{name} is required")));
    }

    let uri: Uri = endpoint.parse().map_err(|e| {
        Error::config_invalid(format!("{name} {endpoint:?} is not a valid uri")).with_source(e)
    })?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(Error::config_invalid(format!(
            "{name} {endpoint:?} must include scheme and host"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use azstore_core::{ErrorKind, StaticEnv};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env_ctx(pairs: &[(&str, &str)]) -> Context {
        Context::new().with_env(StaticEnv {
            envs: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        })
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();

        assert_eq!(cfg.number_of_concurrency, 25);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.base_retry_interval_ms, 1000);
        assert_eq!(cfg.max_retry_interval_ms, 120_000);
        assert_eq!(cfg.location_mode, LocationMode::PrimaryOnly);
        assert_eq!(cfg.chunk_size, 4 * 1024 * 1024);
        assert_eq!(cfg.service, Service::Blob);
        assert_eq!(cfg.max_retry_elapsed_ms, None);
    }

    #[test]
    fn test_from_env() {
        let ctx = env_ctx(&[
            (AZSTORE_ENDPOINT, "https://acct.blob.core.windows.net"),
            (AZSTORE_SECONDARY_ENDPOINT, "https://acct-secondary.blob.core.windows.net"),
            (AZSTORE_CONCURRENCY, "4"),
            (AZSTORE_MAX_RETRIES, "5"),
            (AZSTORE_LOCATION_MODE, "primary_then_secondary"),
            (AZSTORE_CHUNK_SIZE, "1048576"),
        ]);

        let cfg = Config::default().from_env(&ctx).unwrap();
        cfg.validate().unwrap();

        assert_eq!(cfg.endpoint, "https://acct.blob.core.windows.net");
        assert_eq!(cfg.number_of_concurrency, 4);
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.location_mode, LocationMode::PrimaryThenSecondary);
        assert_eq!(cfg.chunk_size, 1024 * 1024);
        assert_eq!(cfg.base_retry_interval_ms, 1000);
    }

    #[test]
    fn test_max_retry_elapsed_reaches_policy() {
        use crate::retry::{Failure, RetryAction};
        use http::StatusCode;

        let ctx = env_ctx(&[(AZSTORE_MAX_RETRY_ELAPSED_MS, "0")]);
        let cfg = Config::new("https://acct.blob.core.windows.net")
            .from_env(&ctx)
            .unwrap();
        assert_eq!(cfg.max_retry_elapsed_ms, Some(0));

        let busy = Failure::Status(StatusCode::SERVICE_UNAVAILABLE);
        let policy = cfg.retry_policy();
        let mut state = policy.start(true);
        assert_eq!(
            policy.next_action(&mut state, busy, true),
            RetryAction::GiveUp
        );

        // Without the limit the same failure is retried.
        let policy = Config::new("https://acct.blob.core.windows.net").retry_policy();
        let mut state = policy.start(true);
        assert!(matches!(
            policy.next_action(&mut state, busy, true),
            RetryAction::Retry { .. }
        ));
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        let ctx = env_ctx(&[(AZSTORE_CONCURRENCY, "many")]);
        let err = Config::default().from_env(&ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_validate() {
        let ok = Config::new("https://acct.blob.core.windows.net");
        ok.validate().unwrap();

        let cases = vec![
            Config::default(),
            Config::new("acct.blob.core.windows.net"),
            Config {
                number_of_concurrency: 0,
                ..ok.clone()
            },
            Config {
                chunk_size: 0,
                ..ok.clone()
            },
            Config {
                location_mode: LocationMode::SecondaryOnly,
                ..ok.clone()
            },
        ];
        for cfg in cases {
            let err = cfg.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConfigInvalid, "{cfg:?}");
        }
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let cfg: Config = serde_json::from_str(
            r#"{"endpoint": "https://acct.file.core.windows.net", "service": "file", "location_mode": "secondary_then_primary"}"#,
        )
        .unwrap();

        assert_eq!(cfg.service, Service::File);
        assert_eq!(cfg.location_mode, LocationMode::SecondaryThenPrimary);
        assert_eq!(cfg.number_of_concurrency, DEFAULT_CONCURRENCY);
    }
}

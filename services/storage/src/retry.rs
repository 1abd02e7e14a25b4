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

//! Retry decisions for a single logical operation.
//!
//! Nothing here performs I/O or sleeps, the executor acts on the returned
//! [`RetryAction`].

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use azstore_core::{Error, ErrorKind, Result};
use http::StatusCode;

use crate::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_MAX_RETRY_INTERVAL_MS, DEFAULT_RETRY_INTERVAL_MS,
};

/// Which endpoints read operations may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationMode {
    /// Always use the primary endpoint.
    #[default]
    PrimaryOnly,
    /// Always use the secondary endpoint for reads.
    SecondaryOnly,
    /// Start on the primary, alternate on every retry.
    PrimaryThenSecondary,
    /// Start on the secondary, alternate on every retry.
    SecondaryThenPrimary,
}

impl LocationMode {
    /// Whether this mode ever reads from the secondary endpoint.
    pub fn uses_secondary(&self) -> bool {
        !matches!(self, LocationMode::PrimaryOnly)
    }
}

impl FromStr for LocationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary_only" => Ok(LocationMode::PrimaryOnly),
            "secondary_only" => Ok(LocationMode::SecondaryOnly),
            "primary_then_secondary" => Ok(LocationMode::PrimaryThenSecondary),
            "secondary_then_primary" => Ok(LocationMode::SecondaryThenPrimary),
            v => Err(Error::config_invalid(format!("unknown location mode {v:?}"))),
        }
    }
}

/// The endpoint an attempt is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Primary, read-write endpoint.
    Primary,
    /// Geo-replicated, read-only endpoint.
    Secondary,
}

impl Endpoint {
    fn flip(self) -> Self {
        match self {
            Endpoint::Primary => Endpoint::Secondary,
            Endpoint::Secondary => Endpoint::Primary,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Primary => write!(f, "primary"),
            Endpoint::Secondary => write!(f, "secondary"),
        }
    }
}

/// Classified failure of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Connection refused, timeout, DNS.
    Network,
    /// The service answered outside the expected status set.
    Status(StatusCode),
}

impl Failure {
    /// Classify an error returned by an attempt.
    ///
    /// Returns `None` for errors that must never be retried, such as an
    /// invalid request or credential.
    pub fn classify(err: &Error) -> Option<Failure> {
        match err.kind() {
            ErrorKind::Network => Some(Failure::Network),
            ErrorKind::Service => err.status().map(Failure::Status),
            _ => None,
        }
    }

    /// Network failures, 5xx and 408 may succeed when tried again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Failure::Network => true,
            Failure::Status(code) => {
                code.is_server_error() || *code == StatusCode::REQUEST_TIMEOUT
            }
        }
    }
}

/// Per-operation retry bookkeeping.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    started: Instant,
    endpoint: Endpoint,
    last_failure: Option<Failure>,
}

impl RetryState {
    fn new(endpoint: Endpoint) -> Self {
        Self {
            attempt: 0,
            started: Instant::now(),
            endpoint,
            last_failure: None,
        }
    }

    /// Number of retries granted so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Endpoint the next attempt targets.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// The failure passed to the last decision.
    pub fn last_failure(&self) -> Option<Failure> {
        self.last_failure
    }
}

/// What the executor should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Surface the failure to the caller.
    GiveUp,
    /// Wait `delay`, then send again to `endpoint`.
    Retry {
        /// Time to wait before the next attempt.
        delay: Duration,
        /// Endpoint for the next attempt.
        endpoint: Endpoint,
    },
}

/// Exponential backoff retry policy with optional secondary reads.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_interval: Duration,
    max_interval: Duration,
    max_elapsed: Option<Duration>,
    location_mode: LocationMode,
    has_secondary: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_interval: Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            max_interval: Duration::from_millis(DEFAULT_MAX_RETRY_INTERVAL_MS),
            max_elapsed: None,
            location_mode: LocationMode::PrimaryOnly,
            has_secondary: false,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retries after the first attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_base_interval(mut self, interval: Duration) -> Self {
        self.base_interval = interval;
        self
    }

    /// Cap a single delay.
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Give up once this much time has passed since the first attempt.
    pub fn with_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = Some(elapsed);
        self
    }

    /// Set the location mode and whether a secondary endpoint exists.
    pub fn with_location_mode(mut self, mode: LocationMode, has_secondary: bool) -> Self {
        self.location_mode = mode;
        self.has_secondary = has_secondary;
        self
    }

    /// Start tracking a new logical operation.
    pub fn start(&self, idempotent: bool) -> RetryState {
        let endpoint = if idempotent && self.has_secondary {
            match self.location_mode {
                LocationMode::SecondaryOnly | LocationMode::SecondaryThenPrimary => {
                    Endpoint::Secondary
                }
                LocationMode::PrimaryOnly | LocationMode::PrimaryThenSecondary => Endpoint::Primary,
            }
        } else {
            Endpoint::Primary
        };

        RetryState::new(endpoint)
    }

    /// Decide what to do after `failure`.
    ///
    /// Writes are never redirected to the secondary endpoint.
    pub fn next_action(
        &self,
        state: &mut RetryState,
        failure: Failure,
        idempotent: bool,
    ) -> RetryAction {
        state.last_failure = Some(failure);

        if !failure.is_retryable() || state.attempt >= self.max_retries {
            return RetryAction::GiveUp;
        }
        if let Some(max) = self.max_elapsed {
            if state.started.elapsed() >= max {
                return RetryAction::GiveUp;
            }
        }

        let delay = self.delay(state.attempt);
        state.attempt += 1;
        state.endpoint = self.next_endpoint(state.endpoint, idempotent);

        RetryAction::Retry {
            delay,
            endpoint: state.endpoint,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_interval
            .checked_mul(factor)
            .map_or(self.max_interval, |d| d.min(self.max_interval))
    }

    fn next_endpoint(&self, current: Endpoint, idempotent: bool) -> Endpoint {
        if !idempotent || !self.has_secondary {
            return Endpoint::Primary;
        }

        match self.location_mode {
            LocationMode::PrimaryOnly => Endpoint::Primary,
            LocationMode::SecondaryOnly => Endpoint::Secondary,
            LocationMode::PrimaryThenSecondary | LocationMode::SecondaryThenPrimary => {
                current.flip()
            }
        }
    }
}

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

use azstore_core::{Context, Error, Result, Signer};
use bytes::Bytes;
use http::{Request, Response};
use log::{debug, warn};

use crate::config::Config;
use crate::retry::{Endpoint, Failure, RetryAction, RetryPolicy};
use crate::{Credential, Operation};

/// Executor sends operations with signing and retries.
///
/// Every attempt builds, signs and sends a fresh request. Failures that the
/// retry policy rejects are returned unchanged, so callers can inspect the
/// status and body the service produced.
#[derive(Clone, Debug)]
pub struct Executor {
    ctx: Context,
    signer: Signer<Credential>,
    primary: String,
    secondary: Option<String>,
    policy: RetryPolicy,
}

impl Executor {
    /// Create an executor from a validated config.
    pub fn new(ctx: Context, signer: Signer<Credential>, config: &Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            ctx,
            signer,
            primary: config.endpoint.clone(),
            secondary: config.secondary_endpoint.clone(),
            policy: config.retry_policy(),
        })
    }

    /// Replace the retry policy built from the config.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The retry policy in use.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> &str {
        match (endpoint, &self.secondary) {
            (Endpoint::Secondary, Some(v)) => v,
            _ => &self.primary,
        }
    }

    /// Send `op` until it succeeds or the retry policy gives up.
    pub async fn send(&self, op: &Operation) -> Result<Response<Bytes>> {
        let idempotent = op.is_idempotent();
        let mut state = self.policy.start(idempotent);

        loop {
            let err = match self.send_once(op, state.endpoint()).await {
                Ok(resp) => return Ok(resp),
                Err(err) => err,
            };

            let Some(failure) = Failure::classify(&err) else {
                debug!("{} {} failed without retry: {err}", op.method(), op.path());
                return Err(err);
            };

            match self.policy.next_action(&mut state, failure, idempotent) {
                RetryAction::GiveUp => {
                    debug!(
                        "{} {} failed after {} retries: {err}",
                        op.method(),
                        op.path(),
                        state.attempt()
                    );
                    return Err(err);
                }
                RetryAction::Retry { delay, endpoint } => {
                    warn!(
                        "{} {} failed: {err}, retry {} against {endpoint} in {delay:?}",
                        op.method(),
                        op.path(),
                        state.attempt()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn send_once(&self, op: &Operation, endpoint: Endpoint) -> Result<Response<Bytes>> {
        let (mut parts, body) = op.to_request(self.endpoint_url(endpoint))?.into_parts();
        self.signer.sign(&mut parts, None).await?;

        let resp = self.ctx.http_send(Request::from_parts(parts, body)).await?;
        let status = resp.status();
        if op.is_expected(status) {
            return Ok(resp);
        }

        Err(Error::service(status, resp.into_body()))
    }
}

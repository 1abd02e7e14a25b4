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

//! Chunked uploads with bounded concurrency.

mod builder;
pub use builder::block_id;
pub use builder::BuildChunkRequest;
pub use builder::PutBlock;
pub use builder::PutPage;
pub use builder::PutRange;

mod source;
pub use source::ContentSource;
pub use source::ReaderSource;

mod window;
pub use window::window_at;
pub use window::window_count;
pub use window::RangeWindow;
pub use window::Windows;

use std::ops::Range;

use azstore_core::{Error, Result};
use bytes::Bytes;
use futures::future::{self, Either};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use http::{HeaderMap, Response, StatusCode};
use log::debug;

use crate::config::Config;
use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};
use crate::Executor;

/// Result of one window.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The window this outcome belongs to.
    pub window: RangeWindow,
    /// Response status, `None` if the window was skipped.
    pub status: Option<StatusCode>,
    /// Response headers, empty if the window was skipped.
    pub headers: HeaderMap,
}

impl DispatchOutcome {
    /// Whether the builder turned this window into a no-op.
    pub fn is_skipped(&self) -> bool {
        self.status.is_none()
    }
}

/// Outcomes of a successful dispatch, ordered by window index.
#[derive(Debug, Clone, Default)]
pub struct DispatchResult {
    outcomes: Vec<DispatchOutcome>,
}

impl DispatchResult {
    /// All outcomes.
    pub fn outcomes(&self) -> &[DispatchOutcome] {
        &self.outcomes
    }

    /// Consume into the outcomes.
    pub fn into_outcomes(self) -> Vec<DispatchOutcome> {
        self.outcomes
    }

    /// Number of windows.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the range was empty.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Upload a byte range as concurrent per-window requests.
///
/// At most `concurrency` requests are in flight, a finished slot is refilled
/// from the next window right away. Requests in flight keep running while
/// the next window is read from the source. The first window that fails after its
/// retries stops admission, windows already in flight run to completion, and
/// the dispatch fails with `ChunkDispatch` for that window. Windows already
/// written are not rolled back.
///
/// A source that ends early fails with `RequestInvalid`, errors from the
/// builder are returned as they are.
#[derive(Debug, Clone)]
pub struct ChunkedUpload {
    range: Range<u64>,
    chunk_size: u32,
    concurrency: usize,
    expected_status: Option<Vec<StatusCode>>,
}

impl ChunkedUpload {
    /// Upload `range` with the default chunk size and concurrency.
    pub fn new(range: Range<u64>) -> Self {
        Self {
            range,
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            expected_status: None,
        }
    }

    /// Take chunk size and concurrency from `config`.
    pub fn with_config(self, config: &Config) -> Self {
        self.with_chunk_size(config.chunk_size)
            .with_concurrency(config.number_of_concurrency)
    }

    /// Set the size of one window.
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the number of windows in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Override the statuses accepted for every window.
    pub fn with_expected_status(mut self, expected: &[StatusCode]) -> Self {
        self.expected_status = Some(expected.to_vec());
        self
    }

    /// Upload the range, reading content from `source` in window order.
    pub async fn dispatch<S, B>(
        &self,
        executor: &Executor,
        mut source: S,
        builder: &B,
    ) -> Result<DispatchResult>
    where
        S: ContentSource,
        B: BuildChunkRequest + ?Sized,
    {
        if self.concurrency == 0 {
            return Err(Error::argument_invalid("concurrency must be positive"));
        }
        let mut windows = Windows::new(self.range.clone(), self.chunk_size)?;

        let mut outcomes = Vec::with_capacity(windows.len());
        let mut in_flight = FuturesUnordered::new();
        let mut failure: Option<Error> = None;

        loop {
            while failure.is_none() && in_flight.len() < self.concurrency {
                let Some(window) = windows.next() else {
                    break;
                };

                // Keep the admitted windows moving while the source is read.
                let mut read = source.read_chunk(window.length as usize);
                let content = loop {
                    match future::select(read.as_mut(), in_flight.next()).await {
                        Either::Left((res, _)) => break res,
                        Either::Right((Some(done), _)) => {
                            record(&mut outcomes, &mut failure, done)
                        }
                        Either::Right((None, read)) => break read.await,
                    }
                };
                if failure.is_some() {
                    break;
                }

                let op = content.and_then(|content| builder.build_chunk(&window, content));
                let op = match op {
                    Ok(Some(op)) => op,
                    Ok(None) => {
                        debug!("window {} skipped", window.index);
                        outcomes.push(DispatchOutcome {
                            window,
                            status: None,
                            headers: HeaderMap::new(),
                        });
                        continue;
                    }
                    // Reading or building the window failed before anything was sent.
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                };
                let op = match &self.expected_status {
                    Some(expected) => op.with_expected_status(expected),
                    None => op,
                };

                debug!("window {} submitted: {}", window.index, window.range_header());
                in_flight.push(async move {
                    let res = executor.send(&op).await;
                    (window, res)
                });
            }

            let Some(done) = in_flight.next().await else {
                break;
            };
            record(&mut outcomes, &mut failure, done);
        }

        if let Some(err) = failure {
            return Err(err);
        }

        outcomes.sort_by_key(|o| o.window.index);
        Ok(DispatchResult { outcomes })
    }
}

/// Record a finished window, the first failure stops admission.
fn record(
    outcomes: &mut Vec<DispatchOutcome>,
    failure: &mut Option<Error>,
    (window, res): (RangeWindow, Result<Response<Bytes>>),
) {
    match res {
        Ok(resp) => outcomes.push(DispatchOutcome {
            window,
            status: Some(resp.status()),
            headers: resp.headers().clone(),
        }),
        Err(err) if failure.is_none() => {
            debug!("window {} failed, stop admitting windows: {err}", window.index);
            *failure = Some(Error::chunk_dispatch(window.index, err));
        }
        Err(err) => {
            debug!("window {} failed while draining: {err}", window.index);
        }
    }
}

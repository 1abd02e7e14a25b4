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

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use azstore_core::hash::base64_decode;
use azstore_core::{Context, HttpSend, Result, Signer};
use azstore_storage::{Config, Credential, Executor, RequestSigner, StaticCredentialProvider};
use bytes::Bytes;
use http::{Request, Response};
use percent_encoding::percent_decode_str;

/// In-memory storage endpoint that records every window it receives.
///
/// Windows are identified by their block id, or by `x-ms-range` divided by
/// the chunk size.
#[derive(Debug, Clone)]
pub struct MockStorage {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    chunk_size: u64,
    submitted: Mutex<Vec<usize>>,
    bodies: Mutex<BTreeMap<usize, Bytes>>,
    failing: Mutex<HashMap<usize, u16>>,
    delays: Mutex<HashMap<usize, Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockStorage {
    pub fn new(chunk_size: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                chunk_size,
                submitted: Mutex::default(),
                bodies: Mutex::default(),
                failing: Mutex::default(),
                delays: Mutex::default(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Always answer `status` for `window`.
    pub fn fail_window(&self, window: usize, status: u16) {
        self.inner.failing.lock().unwrap().insert(window, status);
    }

    /// Hold the response for `window` for `delay`.
    pub fn delay_window(&self, window: usize, delay: Duration) {
        self.inner.delays.lock().unwrap().insert(window, delay);
    }

    /// Window indices in the order requests arrived, retries included.
    pub fn submitted(&self) -> Vec<usize> {
        self.inner.submitted.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// Bodies of successful windows joined in window order.
    pub fn content(&self) -> Vec<u8> {
        self.inner
            .bodies
            .lock()
            .unwrap()
            .values()
            .flat_map(|b| b.to_vec())
            .collect()
    }

    fn window_of(&self, req: &Request<Bytes>) -> usize {
        let query = req.uri().query().unwrap_or_default();
        if let Some(id) = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("blockid="))
        {
            let id = percent_decode_str(id).decode_utf8().unwrap();
            let id = String::from_utf8(base64_decode(&id).unwrap()).unwrap();
            return id.trim_start_matches("block-").parse().unwrap();
        }

        let range = req.headers()["x-ms-range"].to_str().unwrap();
        let start: u64 = range
            .trim_start_matches("bytes=")
            .split('-')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        (start / self.inner.chunk_size) as usize
    }
}

#[async_trait]
impl HttpSend for MockStorage {
    async fn http_send(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        assert!(req.headers().contains_key(http::header::AUTHORIZATION));

        let window = self.window_of(&req);
        self.inner.submitted.lock().unwrap().push(window);

        let current = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .max_in_flight
            .fetch_max(current, Ordering::SeqCst);

        let delay = self.inner.delays.lock().unwrap().get(&window).copied();
        tokio::time::sleep(delay.unwrap_or(Duration::from_millis(5))).await;
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(status) = self.inner.failing.lock().unwrap().get(&window) {
            return Ok(Response::builder()
                .status(*status)
                .body(Bytes::from(format!("window {window} rejected")))?);
        }

        self.inner
            .bodies
            .lock()
            .unwrap()
            .insert(window, req.body().clone());
        Ok(Response::builder()
            .status(201)
            .header("x-ms-request-id", window.to_string())
            .body(Bytes::new())?)
    }
}

/// Config pointing at a fake account with instant retries.
pub fn fast_config() -> Config {
    Config {
        max_retries: 2,
        base_retry_interval_ms: 0,
        max_retry_interval_ms: 0,
        ..Config::new("https://acct.blob.core.windows.net")
    }
}

pub fn executor(http: impl HttpSend, config: &Config) -> Executor {
    let _ = env_logger::builder().is_test(true).try_init();

    let ctx = Context::new().with_http_send(http);
    let signer: Signer<Credential> = Signer::new(
        ctx.clone(),
        StaticCredentialProvider::new_shared_key("acct", "a2V5").unwrap(),
        RequestSigner::new(),
    );
    Executor::new(ctx, signer, config).unwrap()
}

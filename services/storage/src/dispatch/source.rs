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

use async_trait::async_trait;
use azstore_core::{Error, Result};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Sequential source of upload content.
///
/// Each call returns the bytes following the previous call. Only the
/// dispatcher's driver loop reads from a source, never the in-flight requests.
#[async_trait]
pub trait ContentSource: Send {
    /// Read exactly `len` bytes.
    ///
    /// Fails with `RequestInvalid` if the source ends early.
    async fn read_chunk(&mut self, len: usize) -> Result<Bytes>;
}

#[async_trait]
impl ContentSource for Bytes {
    async fn read_chunk(&mut self, len: usize) -> Result<Bytes> {
        if len > self.len() {
            return Err(Error::request_invalid(format!(
                "content ended early: wanted {len} bytes, {} left",
                self.len()
            )));
        }

        Ok(self.split_to(len))
    }
}

/// Adapt any [`AsyncRead`] into a [`ContentSource`].
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    consumed: u64,
}

impl<R> ReaderSource<R> {
    /// Wrap `reader`, reading starts at its current position.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            consumed: 0,
        }
    }

    /// Bytes handed out so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ContentSource for ReaderSource<R> {
    async fn read_chunk(&mut self, len: usize) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(len);
        match self.reader.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(Error::request_invalid(format!(
                    "content ended early after {} bytes",
                    self.consumed
                ))
                .with_source(e));
            }
            Err(e) => return Err(e.into()),
        }

        self.consumed += len as u64;
        Ok(buf.freeze())
    }
}

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

use azstore_core::hash::{base64_encode, base64_md5};
use azstore_core::{Error, Result};
use bytes::Bytes;
use http::{Method, StatusCode};

use super::RangeWindow;
use crate::constants::*;
use crate::Operation;

/// Builds the request that uploads one window.
pub trait BuildChunkRequest: Send + Sync {
    /// Build the operation for `window` carrying `content`.
    ///
    /// Returning `None` marks the window as a no-op, nothing is sent for it.
    fn build_chunk(&self, window: &RangeWindow, content: Bytes) -> Result<Option<Operation>>;
}

/// Block id for the window at `index`.
///
/// Every id has the same encoded length, as required within one blob.
pub fn block_id(index: usize) -> String {
    base64_encode(format!("block-{index:010}").as_bytes())
}

fn with_md5(op: Operation, enabled: bool) -> Operation {
    if !enabled {
        return op;
    }
    let md5 = base64_md5(op.body());
    op.with_header(CONTENT_MD5, md5)
}

/// Stage block blob blocks with `Put Block`.
///
/// - [Put Block](https://learn.microsoft.com/en-us/rest/api/storageservices/put-block)
#[derive(Debug, Clone)]
pub struct PutBlock {
    path: String,
    content_md5: bool,
}

impl PutBlock {
    /// Upload blocks for the blob at `path`.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            content_md5: false,
        }
    }

    /// Attach `Content-MD5` to every block.
    pub fn with_content_md5(mut self, enabled: bool) -> Self {
        self.content_md5 = enabled;
        self
    }
}

impl BuildChunkRequest for PutBlock {
    fn build_chunk(&self, window: &RangeWindow, content: Bytes) -> Result<Option<Operation>> {
        let op = Operation::new(Method::PUT, self.path.clone())
            .with_query("comp", "block")
            .with_query("blockid", block_id(window.index))
            .with_body(content)
            .with_expected_status(&[StatusCode::CREATED]);

        Ok(Some(with_md5(op, self.content_md5)))
    }
}

/// Write page blob pages with `Put Page`.
///
/// - [Put Page](https://learn.microsoft.com/en-us/rest/api/storageservices/put-page)
#[derive(Debug, Clone)]
pub struct PutPage {
    path: String,
    content_md5: bool,
    skip_zero_pages: bool,
}

impl PutPage {
    /// Write pages of the page blob at `path`.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            content_md5: false,
            skip_zero_pages: false,
        }
    }

    /// Attach `Content-MD5` to every write.
    pub fn with_content_md5(mut self, enabled: bool) -> Self {
        self.content_md5 = enabled;
        self
    }

    /// Skip windows that contain only zero bytes.
    ///
    /// A new page blob reads as zeros, so these writes are no-ops.
    pub fn with_skip_zero_pages(mut self, enabled: bool) -> Self {
        self.skip_zero_pages = enabled;
        self
    }
}

impl BuildChunkRequest for PutPage {
    fn build_chunk(&self, window: &RangeWindow, content: Bytes) -> Result<Option<Operation>> {
        if window.start % PAGE_SIZE != 0 || u64::from(window.length) % PAGE_SIZE != 0 {
            return Err(Error::argument_invalid(format!(
                "page write {} is not aligned to {PAGE_SIZE} bytes",
                window.range_header()
            )));
        }
        if self.skip_zero_pages && is_all_zero(&content) {
            return Ok(None);
        }

        let op = Operation::new(Method::PUT, self.path.clone())
            .with_query("comp", "page")
            .with_header(X_MS_PAGE_WRITE, "update")
            .with_header(X_MS_RANGE, window.range_header())
            .with_body(content)
            .with_expected_status(&[StatusCode::CREATED]);

        Ok(Some(with_md5(op, self.content_md5)))
    }
}

/// Write file ranges with `Put Range`.
///
/// - [Put Range](https://learn.microsoft.com/en-us/rest/api/storageservices/put-range)
#[derive(Debug, Clone)]
pub struct PutRange {
    path: String,
    content_md5: bool,
    skip_zero_ranges: bool,
}

impl PutRange {
    /// Write ranges of the file at `path`.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            content_md5: false,
            skip_zero_ranges: false,
        }
    }

    /// Attach `Content-MD5` to every write.
    pub fn with_content_md5(mut self, enabled: bool) -> Self {
        self.content_md5 = enabled;
        self
    }

    /// Skip windows that contain only zero bytes.
    pub fn with_skip_zero_ranges(mut self, enabled: bool) -> Self {
        self.skip_zero_ranges = enabled;
        self
    }
}

impl BuildChunkRequest for PutRange {
    fn build_chunk(&self, window: &RangeWindow, content: Bytes) -> Result<Option<Operation>> {
        if self.skip_zero_ranges && is_all_zero(&content) {
            return Ok(None);
        }

        let op = Operation::new(Method::PUT, self.path.clone())
            .with_query("comp", "range")
            .with_header(X_MS_WRITE, "update")
            .with_header(X_MS_RANGE, window.range_header())
            .with_body(content)
            .with_expected_status(&[StatusCode::CREATED]);

        Ok(Some(with_md5(op, self.content_md5)))
    }
}

fn is_all_zero(content: &[u8]) -> bool {
    content.iter().all(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use azstore_core::ErrorKind;
    use pretty_assertions::assert_eq;

    fn window(index: usize, start: u64, length: u32) -> RangeWindow {
        RangeWindow {
            index,
            start,
            length,
            is_last: false,
        }
    }

    #[test]
    fn test_block_id_fixed_width() {
        assert_eq!(block_id(0).len(), block_id(123_456).len());
        assert_ne!(block_id(1), block_id(10));
    }

    #[test]
    fn test_put_block() {
        let op = PutBlock::new("/c/b")
            .with_content_md5(true)
            .build_chunk(&window(7, 0, 11), Bytes::from_static(b"hello world"))
            .unwrap()
            .unwrap();

        assert_eq!(op.query("comp"), Some("block"));
        assert_eq!(op.query("blockid"), Some(block_id(7).as_str()));
        assert_eq!(op.header(CONTENT_MD5), Some("XrY7u+Ae7tCTyyK7j1rNww=="));
        assert!(op.is_expected(StatusCode::CREATED));
        assert!(!op.is_expected(StatusCode::OK));
    }

    #[test]
    fn test_put_page() {
        let builder = PutPage::new("/c/disk.vhd").with_skip_zero_pages(true);

        let op = builder
            .build_chunk(&window(1, 512, 512), Bytes::from(vec![1u8; 512]))
            .unwrap()
            .unwrap();
        assert_eq!(op.query("comp"), Some("page"));
        assert_eq!(op.header(X_MS_PAGE_WRITE), Some("update"));
        assert_eq!(op.header(X_MS_RANGE), Some("bytes=512-1023"));
        assert_eq!(op.header(CONTENT_MD5), None);

        let skipped = builder
            .build_chunk(&window(2, 1024, 512), Bytes::from(vec![0u8; 512]))
            .unwrap();
        assert!(skipped.is_none());
    }

    #[test]
    fn test_put_page_alignment() {
        let err = PutPage::new("/c/disk.vhd")
            .build_chunk(&window(0, 0, 100), Bytes::from(vec![1u8; 100]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentInvalid);
    }

    #[test]
    fn test_put_range() {
        let builder = PutRange::new("/share/dir/file.txt");
        let op = builder
            .build_chunk(&window(0, 0, 3), Bytes::from_static(&[0, 0, 0]))
            .unwrap()
            .unwrap();
        assert_eq!(op.query("comp"), Some("range"));
        assert_eq!(op.header(X_MS_WRITE), Some("update"));
        assert_eq!(op.header(X_MS_RANGE), Some("bytes=0-2"));

        let skipped = builder
            .with_skip_zero_ranges(true)
            .build_chunk(&window(0, 0, 3), Bytes::from_static(&[0, 0, 0]))
            .unwrap();
        assert!(skipped.is_none());
    }
}

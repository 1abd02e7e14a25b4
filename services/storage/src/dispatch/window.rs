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

use std::ops::Range;

use azstore_core::{Error, Result};

/// One chunk of a chunked upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeWindow {
    /// Position of the window, starting at 0.
    pub index: usize,
    /// Absolute offset of the first byte.
    pub start: u64,
    /// Number of bytes, never zero.
    pub length: u32,
    /// Whether this is the final window of the range.
    pub is_last: bool,
}

impl RangeWindow {
    /// Offset one past the last byte.
    pub fn end(&self) -> u64 {
        self.start + u64::from(self.length)
    }

    /// Value for `x-ms-range`, with an inclusive end.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end() - 1)
    }
}

/// Number of windows `range` splits into.
pub fn window_count(range: &Range<u64>, chunk_size: u32) -> usize {
    if chunk_size == 0 || range.is_empty() {
        return 0;
    }

    let total = range.end - range.start;
    total.div_ceil(u64::from(chunk_size)) as usize
}

/// The `index`-th window of `range`, or `None` past the end.
///
/// Windows are contiguous, only the last one may be shorter than `chunk_size`.
pub fn window_at(range: &Range<u64>, chunk_size: u32, index: usize) -> Option<RangeWindow> {
    let count = window_count(range, chunk_size);
    if index >= count {
        return None;
    }

    let start = range.start + index as u64 * u64::from(chunk_size);
    let length = (range.end - start).min(u64::from(chunk_size)) as u32;
    Some(RangeWindow {
        index,
        start,
        length,
        is_last: index + 1 == count,
    })
}

/// Iterator over the windows of a range, in order.
#[derive(Debug, Clone)]
pub struct Windows {
    range: Range<u64>,
    chunk_size: u32,
    next: usize,
    count: usize,
}

impl Windows {
    /// Split `range` into windows of `chunk_size` bytes.
    pub fn new(range: Range<u64>, chunk_size: u32) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::argument_invalid("chunk size must be positive"));
        }
        if range.start > range.end {
            return Err(Error::argument_invalid(format!(
                "upload range {range:?} is reversed"
            )));
        }

        let count = window_count(&range, chunk_size);
        Ok(Self {
            range,
            chunk_size,
            next: 0,
            count,
        })
    }
}

impl Iterator for Windows {
    type Item = RangeWindow;

    fn next(&mut self) -> Option<Self::Item> {
        let window = window_at(&self.range, self.chunk_size, self.next)?;
        self.next += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}

#[cfg(test)]
mod tests {
    use super::*;
    use azstore_core::ErrorKind;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0..10, 4, 3; "remainder")]
    #[test_case(0..8, 4, 2; "exact")]
    #[test_case(100..101, 4, 1; "single byte")]
    #[test_case(5..5, 4, 0; "empty")]
    fn test_partition(range: Range<u64>, chunk: u32, count: usize) {
        let windows: Vec<_> = Windows::new(range.clone(), chunk).unwrap().collect();
        assert_eq!(windows.len(), count);

        let mut cursor = range.start;
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.index, i);
            assert_eq!(w.start, cursor);
            assert!(w.length > 0 && w.length <= chunk);
            assert_eq!(w.is_last, i + 1 == count);
            cursor = w.end();
        }
        assert_eq!(cursor, range.end);
    }

    #[test]
    fn test_window_at() {
        let w = window_at(&(512..2048), 1024, 1).unwrap();
        assert_eq!(
            w,
            RangeWindow {
                index: 1,
                start: 1536,
                length: 512,
                is_last: true
            }
        );
        assert_eq!(w.range_header(), "bytes=1536-2047");
        assert_eq!(window_at(&(512..2048), 1024, 2), None);
    }

    #[test]
    fn test_zero_chunk_size() {
        let err = Windows::new(0..10, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentInvalid);
    }

    #[test]
    fn test_exact_size() {
        let mut windows = Windows::new(0..10, 3).unwrap();
        assert_eq!(windows.len(), 4);
        windows.next();
        assert_eq!(windows.len(), 3);
    }
}

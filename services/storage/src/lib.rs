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

//! Storage request signing, retries and chunked uploads.
//!
//! This crate provides:
//! - Shared Key authorization for blob, file, queue and table requests
//! - SAS token authentication, and account and service SAS generation
//! - An [`Executor`] that signs every attempt and retries with backoff,
//!   optionally reading from a secondary endpoint
//! - [`ChunkedUpload`], which splits large bodies into windows and sends them
//!   with bounded concurrency
//!
//! # Example
//!
//! ```rust,no_run
//! use azstore_core::{Context, OsEnv, Result, Signer};
//! use azstore_http_send_reqwest::ReqwestHttpSend;
//! use azstore_storage::{
//!     ChunkedUpload, Config, EnvCredentialProvider, Executor, PutBlock, RequestSigner,
//! };
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ctx = Context::new()
//!         .with_http_send(ReqwestHttpSend::default())
//!         .with_env(OsEnv);
//!     let config = Config::default().from_env(&ctx)?;
//!
//!     let signer = Signer::new(
//!         ctx.clone(),
//!         EnvCredentialProvider::new(),
//!         RequestSigner::from_config(&config),
//!     );
//!     let executor = Executor::new(ctx, signer, &config)?;
//!
//!     let content = Bytes::from(vec![1u8; 10 * 1024 * 1024]);
//!     let result = ChunkedUpload::new(0..content.len() as u64)
//!         .with_config(&config)
//!         .dispatch(&executor, content, &PutBlock::new("/container/blob"))
//!         .await?;
//!     println!("uploaded {} blocks", result.len());
//!
//!     Ok(())
//! }
//! ```

pub mod constants;

mod canonical;
pub use canonical::canonicalize;
pub use canonical::CanonicalRequest;
pub use canonical::Service;

mod credential;
pub use credential::AccountKey;
pub use credential::Credential;

mod sign_request;
pub use sign_request::authorization;
pub use sign_request::RequestSigner;

mod sas;
pub use sas::AccountSharedAccessSignature;
pub use sas::SasResource;
pub use sas::ServiceSharedAccessSignature;

mod retry;
pub use retry::Endpoint;
pub use retry::Failure;
pub use retry::LocationMode;
pub use retry::RetryAction;
pub use retry::RetryPolicy;
pub use retry::RetryState;

mod config;
pub use config::Config;

mod operation;
pub use operation::Operation;

mod executor;
pub use executor::Executor;

mod dispatch;
pub use dispatch::*;

mod provide_credential;
pub use provide_credential::*;

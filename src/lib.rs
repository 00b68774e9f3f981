//! `deqm-http` is an async HTTP client for the asynchronous operations of a
//! DEQM (Data Exchange for Quality Measures) FHIR server.
//!
//! An operation such as bulk `$import` or `Measure/$bulk-submit-data` is
//! kicked off with `Prefer: respond-async`; the server answers `202` with a
//! `Content-Location` that is then polled until it stops reporting progress:
//! - [`DeqmClient::bulk_import`] / [`DeqmClient::bulk_submit_data`]
//! - [`DeqmClient::poll`] / [`AsyncOperationPoller::poll`]
//! - [`PollResponse::resource`] for typed FHIR results

pub mod backoff;
mod client;
mod error;
mod headers;
mod options;
mod poller;
pub mod resource;
mod types;

pub use client::{DeqmClient, BULK_IMPORT_PATH, BULK_SUBMIT_DATA_PATH};
pub use error::DeqmError;
pub use headers::Headers;
pub use options::{ClientOptions, PollOptions};
pub use poller::AsyncOperationPoller;
pub use resource::Resource;
pub use types::{PollOutcome, PollResponse};

pub type Result<T> = std::result::Result<T, DeqmError>;

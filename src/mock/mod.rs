//! Mock Service Implementation
//!
//! In-process stand-in for the remote analysis service, driven through
//! `MockTransport`. Supports every operation with failure injection and
//! scripted job progressions for testing the orchestration paths.
//!
//! # Operations
//!
//! - `create_upload_url`: hand out a `mock://uploads/<id>` location
//! - presigned transfer: verify digest and length, store bytes
//! - `start_fix_job`: validate the upload, create a job with the configured
//!   id and initial status
//! - `get_fix_job`: report the next scripted status
//! - `get_fix_result`: return the configured fix (or no payload)

mod failure;
mod service;
mod state;

pub use failure::{FailureConfig, FailureInjector};
pub use service::MockService;
pub use state::{default_fix, Job, MockState, Upload};

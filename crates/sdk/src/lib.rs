//! Verba SDK - Rust Client Library
//!
//! Client for the Verba daemon's JSON-RPC API.
//!
//! # Example
//!
//! ```no_run
//! use verba_sdk::{JobKind, SubmitRequest, VerbaClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = VerbaClient::connect("http://127.0.0.1:9527").await?;
//!
//!     let response = client.submit(SubmitRequest {
//!         kind: JobKind::Audio,
//!         inputs: vec!["/data/meeting.mp3".to_string()],
//!         settings: json!({"language": "en"}),
//!         label: None,
//!     }).await?;
//!
//!     println!("Job submitted: {}", response.job_id);
//!     Ok(())
//! }
//! ```

mod client;
mod error;

pub use client::{JobEvents, VerbaClient};
pub use error::{Result, SdkError};
pub use verba_api_rpc::types::{
    CancelResponse, JobSummary, ListJobsRequest, ListJobsResponse, RemoveResponse,
    StatsResponse, SubmitResponse,
};
pub use verba_core::application::{DeliveryEvent, SubmitRequest};
pub use verba_core::domain::{JobKind, JobSnapshot, JobStatus};

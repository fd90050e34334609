//! Verba Client Implementation

use crate::error::{Result, SdkError};
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use verba_api_rpc::server::{SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD};
use verba_api_rpc::types::{
    CancelResponse, JobIdRequest, ListJobsRequest, ListJobsResponse, RemoveResponse,
    StatsResponse, SubmitResponse,
};
use verba_core::application::{DeliveryEvent, SubmitRequest};
use verba_core::domain::JobSnapshot;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Serialize a request struct into named params
fn object_params<T: Serialize>(request: &T) -> Result<ObjectParams> {
    let mut params = ObjectParams::new();
    if let Value::Object(map) = serde_json::to_value(request)? {
        for (key, value) in map {
            params.insert(&key, value)?;
        }
    }
    Ok(params)
}

/// Verba Engine Client
///
/// # Example
///
/// ```no_run
/// use verba_sdk::VerbaClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = VerbaClient::connect("http://127.0.0.1:9527").await?;
/// let stats = client.stats().await?;
/// println!("{} jobs", stats.jobs.total);
/// # Ok(())
/// # }
/// ```
pub struct VerbaClient {
    client: HttpClient,
    ws_url: String,
}

impl VerbaClient {
    /// Connect to the Verba daemon
    ///
    /// # Arguments
    ///
    /// * `url` - RPC endpoint URL (e.g., `http://127.0.0.1:9527`)
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();

        let client = HttpClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(url)
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        let ws_url = match url.strip_prefix("https://") {
            Some(rest) => format!("wss://{rest}"),
            None => format!("ws://{}", url.trim_start_matches("http://")),
        };

        Ok(Self { client, ws_url })
    }

    /// Submit one job (one input, or a batch of inputs)
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse> {
        let params = object_params(&request)?;
        Ok(self.client.request("job.submit.v1", params).await?)
    }

    /// Full snapshot of a job, including log lines and result
    pub async fn get(&self, job_id: impl Into<String>) -> Result<JobSnapshot> {
        let params = object_params(&JobIdRequest {
            job_id: job_id.into(),
        })?;
        Ok(self.client.request("job.get.v1", params).await?)
    }

    /// Recent jobs, newest first
    pub async fn list(&self, request: ListJobsRequest) -> Result<ListJobsResponse> {
        let params = object_params(&request)?;
        Ok(self.client.request("job.list.v1", params).await?)
    }

    /// Cancel a pending job or ask a running one to stop
    pub async fn cancel(&self, job_id: impl Into<String>) -> Result<CancelResponse> {
        let params = object_params(&JobIdRequest {
            job_id: job_id.into(),
        })?;
        Ok(self.client.request("job.cancel.v1", params).await?)
    }

    /// Forget a finished job
    pub async fn remove(&self, job_id: impl Into<String>) -> Result<RemoveResponse> {
        let params = object_params(&JobIdRequest {
            job_id: job_id.into(),
        })?;
        Ok(self.client.request("job.remove.v1", params).await?)
    }

    pub async fn stats(&self) -> Result<StatsResponse> {
        Ok(self.client.request("admin.stats.v1", ObjectParams::new()).await?)
    }

    /// Live delivery events for one job over a WebSocket subscription
    ///
    /// # Errors
    /// `SdkError::Rpc` with code 4001 for an unknown job id.
    pub async fn subscribe(&self, job_id: impl Into<String>) -> Result<JobEvents> {
        let client = WsClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(&self.ws_url)
            .await
            .map_err(|e| SdkError::Connection(format!("Failed to open WebSocket: {}", e)))?;
        let params = object_params(&JobIdRequest {
            job_id: job_id.into(),
        })?;
        let subscription = client
            .subscribe(SUBSCRIBE_METHOD, params, UNSUBSCRIBE_METHOD)
            .await?;
        Ok(JobEvents {
            subscription,
            _client: client,
        })
    }
}

/// Event stream of one job; owns its WebSocket connection
pub struct JobEvents {
    subscription: Subscription<DeliveryEvent>,
    _client: WsClient,
}

impl JobEvents {
    /// Next event, `None` once the server closed the stream
    pub async fn next(&mut self) -> Option<Result<DeliveryEvent>> {
        self.subscription
            .next()
            .await
            .map(|item| item.map_err(SdkError::from))
    }
}

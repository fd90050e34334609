//! Simple SDK Example
//!
//! Submits one audio job and prints its delivery events until it finishes.
//!
//! # Usage
//!
//! 1. Start the daemon with an `[pipelines.audio]` entry:
//!    ```bash
//!    cargo run --package verba-daemon
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --example simple -- /path/to/meeting.mp3
//!    ```

use serde_json::json;
use verba_sdk::{DeliveryEvent, JobKind, SubmitRequest, VerbaClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let input = std::env::args()
        .nth(1)
        .ok_or("usage: simple <audio file>")?;

    let client = VerbaClient::connect("http://127.0.0.1:9527").await?;
    let submitted = client
        .submit(SubmitRequest {
            kind: JobKind::Audio,
            inputs: vec![input],
            settings: json!({"language": "en"}),
            label: None,
        })
        .await?;
    println!("Submitted {} ({})", submitted.job_id, submitted.label);

    let mut events = client.subscribe(&submitted.job_id).await?;
    while let Some(event) = events.next().await {
        match event? {
            DeliveryEvent::Progress(p) => println!("{:>3}% {}", p.percent, p.message),
            DeliveryEvent::Log(line) => println!("     {}", line.message),
            DeliveryEvent::Complete(done) => {
                println!("Done: {}", done.result);
                break;
            }
            DeliveryEvent::Error(err) => {
                println!("Failed ({}): {}", err.kind, err.message);
                break;
            }
        }
    }

    Ok(())
}

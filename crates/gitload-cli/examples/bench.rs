use std::sync::Arc;
use std::time::Instant;

use gitload_backend_github::GitHubApi;
use gitload_common::config::PublisherConfig;
use gitload_common::Token;
use gitload_core::{PublishSettings, Publisher};

// Times a full post-lots run. Without URL it targets an in-process fake API.
#[tokio::main]
async fn main() {
    let n: usize = std::env::var("N").ok().and_then(|v| v.parse().ok()).unwrap_or(1000);
    let batch: usize = std::env::var("BATCH").ok().and_then(|v| v.parse().ok()).unwrap_or(10);
    let in_flight: usize = std::env::var("IN_FLIGHT").ok().and_then(|v| v.parse().ok()).unwrap_or(32);

    let api_url = match std::env::var("URL") {
        Ok(url) => url,
        Err(_) => {
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, gitload_fake::app()).await.unwrap(); });
            format!("http://{}", addr)
        }
    };

    let cfg = PublisherConfig { api_url, object_count: n, batch_size: batch, max_in_flight: in_flight, ..Default::default() };
    let token = Token::new(std::env::var("GITHUB_TOKEN").unwrap_or_else(|_| "bench".into())).unwrap();
    let api = GitHubApi::new(&cfg, token).unwrap();

    let start = Instant::now();
    let summary = Publisher::new(Arc::new(api), PublishSettings::from(&cfg)).run().await;
    println!("{} in {:.2}s", summary, start.elapsed().as_secs_f32());
}

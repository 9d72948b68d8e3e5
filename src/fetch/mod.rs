//! HTTP retrieval of raw feed bytes from the vendor endpoint.
//!
//! The decoder itself performs no I/O; everything network-shaped lives
//! behind the [`HttpClient`] trait so tests and auth wrappers can stack on
//! top of a plain client.

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;
use tracing::debug;

/// Fetches one serialized feed message from `url`.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    let bytes = resp.bytes().await?.to_vec();
    debug!(%status, len = bytes.len(), "Feed bytes fetched");
    Ok(bytes)
}

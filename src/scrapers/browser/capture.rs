//! CDP network capture for one URL pattern.
//!
//! A background task pairs `Network.responseReceived` events that match the
//! capture handle with their `Network.loadingFinished` event, then pulls the
//! body with `Network.getResponseBody`. Bodies are queued in arrival order
//! until the controller asks for the next one.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventResponseReceived,
    GetResponseBodyParams, RequestId,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::types::{CaptureHandle, CapturedResponse};

pub(crate) struct CaptureListener {
    handle: CaptureHandle,
    receiver: mpsc::UnboundedReceiver<CapturedResponse>,
    task: JoinHandle<()>,
}

impl CaptureListener {
    /// Enable the network domain and start listening.
    pub async fn spawn(page: &Page, handle: CaptureHandle) -> Result<Self> {
        page.execute(EnableParams::default())
            .await
            .context("Failed to enable network events")?;

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .context("Failed to subscribe to network responses")?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("Failed to subscribe to network completions")?;
        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .context("Failed to subscribe to network failures")?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let filter = handle.clone();
        let page = page.clone();

        let task = tokio::spawn(async move {
            // request id -> (url, status) for matched responses still loading
            let mut pending: HashMap<String, (String, u16)> = HashMap::new();

            loop {
                tokio::select! {
                    Some(event) = responses.next() => {
                        if filter.matches(&event.response.url) {
                            debug!("Matched API response: {}", event.response.url);
                            pending.insert(
                                event.request_id.inner().clone(),
                                (event.response.url.clone(), event.response.status as u16),
                            );
                        }
                    }
                    Some(event) = finished.next() => {
                        let Some((url, status)) = pending.remove(event.request_id.inner()) else {
                            continue;
                        };
                        match fetch_body(&page, event.request_id.clone()).await {
                            Ok(body) => {
                                if sender.send(CapturedResponse { url, status, body }).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Could not read captured body for {}: {:#}", url, e),
                        }
                    }
                    Some(event) = failed.next() => {
                        if let Some((url, _)) = pending.remove(event.request_id.inner()) {
                            warn!("Matched API request failed: {} ({})", url, event.error_text);
                        }
                    }
                    else => break,
                }
            }
            debug!("Capture listener stopped");
        });

        Ok(Self {
            handle,
            receiver,
            task,
        })
    }

    pub fn handle(&self) -> &CaptureHandle {
        &self.handle
    }

    /// Next queued response, or `None` once `timeout` elapses. Errors if the
    /// listener task has stopped and nothing more can arrive.
    pub async fn next(&mut self, timeout: Duration) -> Result<Option<CapturedResponse>> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(response)) => Ok(Some(response)),
            Ok(None) => anyhow::bail!(
                "capture listener for {} has stopped",
                self.handle.pattern()
            ),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for CaptureListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn fetch_body(page: &Page, request_id: RequestId) -> Result<String> {
    let returns = page
        .execute(GetResponseBodyParams::new(request_id))
        .await
        .context("Network.getResponseBody failed")?
        .result;

    if returns.base64_encoded {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(returns.body.as_bytes())
            .context("Captured body is not valid base64")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(returns.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> (mpsc::UnboundedSender<CapturedResponse>, CaptureListener) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let listener = CaptureListener {
            handle: CaptureHandle::new("functionId=pc_club_productPageComments"),
            receiver,
            task: tokio::spawn(std::future::pending::<()>()),
        };
        (sender, listener)
    }

    #[tokio::test]
    async fn test_queued_response_is_returned() {
        let (sender, mut listener) = listener();
        sender
            .send(CapturedResponse {
                url: "https://api.m.jd.com/?functionId=pc_club_productPageComments".into(),
                status: 200,
                body: "{}".into(),
            })
            .unwrap();

        let response = listener.next(Duration::from_millis(10)).await.unwrap();
        assert_eq!(response.map(|r| r.body), Some("{}".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_listener_times_out() {
        let (_sender, mut listener) = listener();
        assert!(listener.next(Duration::from_secs(15)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stopped_listener_is_error() {
        let (sender, mut listener) = listener();
        drop(sender);

        let err = listener.next(Duration::from_secs(15)).await.unwrap_err();
        assert!(err.to_string().contains("has stopped"));
    }
}

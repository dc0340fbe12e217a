use std::time::Duration;
use anyhow::{Context, Result};
use serde::Deserialize;

use super::{Whitelist, WhitelistSource};
use crate::state::WhitelistSettings;

#[derive(Debug, Deserialize)]
struct WhitelistResponse {
    #[serde(default)]
    status: String,
    whitelist: Vec<String>,
}

/// Fetches the allow-list, retrying up to `attempts` times. Never fails:
/// any error yields the built-in fallback list.
pub async fn fetch(settings: &WhitelistSettings) -> Whitelist {
    match fetch_with_retry(settings).await {
        Ok(numbers) => Whitelist::new(numbers, WhitelistSource::Remote),
        Err(e) => {
            tracing::warn!("Whitelist fetch failed: {:#}. Using fallback list.", e);
            Whitelist::fallback()
        }
    }
}

async fn fetch_with_retry(settings: &WhitelistSettings) -> Result<Vec<String>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(settings.timeout_ms))
        .build()?;

    let attempts = settings.attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match fetch_once(&client, &settings.endpoint).await {
            Ok(numbers) => return Ok(numbers),
            Err(e) => {
                tracing::warn!("Whitelist fetch attempt {}/{} failed: {:#}", attempt, attempts, e);
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(Duration::from_millis(settings.retry_delay_ms)).await;
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No fetch attempts made")))
}

async fn fetch_once(client: &reqwest::Client, url: &str) -> Result<Vec<String>> {
    tracing::info!("Fetching whitelist from {}", url);
    let resp = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .header("User-Agent", "VoiceAssist/0.1")
        .send()
        .await?
        .error_for_status()?;

    let body: WhitelistResponse = resp.json().await.context("Malformed whitelist response")?;
    if body.status != "success" {
        tracing::warn!("Whitelist endpoint reported status '{}'", body.status);
    }
    Ok(body.whitelist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    /// Serves `responses` in order, one per connection, then keeps
    /// repeating the last one. Returns the base URL and a hit counter.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = assert_ok!(listener.local_addr());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (code, body) = responses[n.min(responses.len() - 1)];
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    code,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/api/whatsapp-numbers.json", addr), hits)
    }

    fn settings(endpoint: String) -> WhitelistSettings {
        WhitelistSettings {
            endpoint,
            timeout_ms: 2_000,
            attempts: 3,
            retry_delay_ms: 10,
            cache_ttl_s: 300,
        }
    }

    #[tokio::test]
    async fn remote_list_is_used_when_reachable() {
        let (url, hits) = serve(vec![(
            200,
            r#"{"status":"success","whitelist":["+12025550123"," +447911123456 "]}"#,
        )])
        .await;

        let list = fetch(&settings(url)).await;
        assert_eq!(list.source(), WhitelistSource::Remote);
        assert_eq!(list.len(), 2);
        assert!(list.contains("+12025550123"));
        assert!(list.contains("+447911123456"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let (url, hits) = serve(vec![
            (500, "{}"),
            (503, "{}"),
            (200, r#"{"status":"success","whitelist":["+923001234567"]}"#),
        ])
        .await;

        let list = fetch(&settings(url)).await;
        assert_eq!(list.source(), WhitelistSource::Remote);
        assert!(list.contains("+923001234567"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts_with_fallback() {
        let (url, hits) = serve(vec![(200, "not json")]).await;

        let list = fetch(&settings(url)).await;
        assert_eq!(list.source(), WhitelistSource::Fallback);
        assert!(list.contains("+4915123456789"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_fallback() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = assert_ok!(std::net::TcpListener::bind("127.0.0.1:0"));
            assert_ok!(listener.local_addr()).port()
        };
        let list = fetch(&settings(format!("http://127.0.0.1:{}/whitelist.json", port))).await;
        assert_eq!(list.source(), WhitelistSource::Fallback);
        assert_eq!(list.len(), super::super::FALLBACK_WHITELIST.len());
    }
}

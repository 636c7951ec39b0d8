use crate::error::{CompletionError, CompletionResult};
use crate::types::{ChatMessage, CompletionRequest, CompletionResponse, Role, StreamChunk};
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use log::{debug, trace};
use std::time::Duration;
use tokio::time::timeout;

const DONE_SENTINEL: &str = "[DONE]";

/// Reserved token in system-prompt content, replaced with the current local
/// date/time on every send so long-lived conversations stay temporally
/// accurate.
pub const DATE_PLACEHOLDER: &str = "{{date}}";

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Receives text fragments in strict arrival order while a stream is live.
pub type DeltaSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Connection-level settings, snapshotted when the client is built. Updating
/// assistant settings takes effect on the next client, never mid-request.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    /// Bound on the whole call including body/stream consumption. `None`
    /// leaves long streams unbounded; the idle timeout still applies.
    pub request_timeout: Option<Duration>,
    /// Bound on the gap between consecutive stream reads.
    pub idle_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            request_timeout: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Client for one OpenAI-compatible `/chat/completions` endpoint.
///
/// One implementation serves both consumption modes: `send` resolves with
/// the final aggregate only, `send_streaming` additionally pushes each delta
/// to a callback before resolving with the exact concatenation.
pub struct CompletionClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub async fn send(&self, request: &CompletionRequest) -> CompletionResult<String> {
        self.execute(request, None).await
    }

    pub async fn send_streaming(
        &self,
        request: &CompletionRequest,
        on_delta: &mut (dyn FnMut(&str) + Send),
    ) -> CompletionResult<String> {
        self.execute(request, Some(on_delta)).await
    }

    async fn execute(
        &self,
        request: &CompletionRequest,
        mut sink: Option<DeltaSink<'_>>,
    ) -> CompletionResult<String> {
        if self.config.api_key.trim().is_empty() {
            return Err(CompletionError::Configuration(
                "API key is not configured".to_string(),
            ));
        }
        if self.config.base_url.trim().is_empty() {
            return Err(CompletionError::Configuration(
                "base URL is not configured".to_string(),
            ));
        }

        let mut body = request.clone();
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
        for message in &mut body.messages {
            resolve_date_placeholder(message, &now);
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!("POST {} (model={}, stream={})", url, body.model, body.stream);

        let mut http_request = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(request_timeout) = self.config.request_timeout {
            http_request = http_request.timeout(request_timeout);
        }

        let response = http_request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Protocol {
                status: Some(status.as_u16()),
                message: error_body,
            });
        }

        if body.stream {
            collect_sse(response.bytes_stream(), sink, self.config.idle_timeout).await
        } else {
            let text = response.text().await?;
            let parsed: CompletionResponse =
                serde_json::from_str(&text).map_err(|e| CompletionError::Protocol {
                    status: None,
                    message: format!("unexpected response shape: {e}"),
                })?;
            let content = parsed
                .into_content()
                .filter(|content| !content.is_empty())
                .ok_or_else(|| CompletionError::Protocol {
                    status: None,
                    message: "response contained no choices".to_string(),
                })?;
            if let Some(ref mut callback) = sink {
                (*callback)(&content);
            }
            Ok(content)
        }
    }
}

/// Replace the date placeholder in system-role content. Done at send time,
/// every call, never once at configuration time.
fn resolve_date_placeholder(message: &mut ChatMessage, now: &str) {
    if message.role == Role::System && message.content.contains(DATE_PLACEHOLDER) {
        message.content = message.content.replace(DATE_PLACEHOLDER, now);
    }
}

/// Drain an SSE byte stream into the concatenated completion text.
///
/// Events that fail to parse as completion chunks are skipped; providers
/// interleave control lines and keepalives that are not ours to reject. A
/// stream that closes without the `[DONE]` sentinel still returns whatever
/// was accumulated; only transport failures, timeouts and an entirely empty
/// stream are errors.
async fn collect_sse<S, B, E>(
    byte_stream: S,
    mut sink: Option<DeltaSink<'_>>,
    idle_timeout: Duration,
) -> CompletionResult<String>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let stream = byte_stream.eventsource();
    tokio::pin!(stream);

    let mut accumulated = String::new();
    loop {
        let event = match timeout(idle_timeout, stream.next()).await {
            Ok(Some(Ok(event))) => event,
            // Lenient on early close: deliver what we have.
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                return Err(CompletionError::Transport(format!("SSE stream error: {e}")));
            }
            Err(_) => {
                return Err(CompletionError::Timeout(format!(
                    "no stream data for {}s",
                    idle_timeout.as_secs()
                )));
            }
        };

        let raw = event.data;
        trace!("SSE event: {:?}", raw);
        if raw == DONE_SENTINEL {
            break;
        }

        let chunk: StreamChunk = match serde_json::from_str(&raw) {
            Ok(chunk) => chunk,
            Err(e) => {
                trace!("skipping unparseable SSE event: {e}");
                continue;
            }
        };

        if let Some(content) = chunk.into_content() {
            if !content.is_empty() {
                accumulated.push_str(&content);
                if let Some(ref mut callback) = sink {
                    (*callback)(&content);
                }
            }
        }
    }

    if accumulated.is_empty() {
        return Err(CompletionError::Protocol {
            status: None,
            message: "stream completed without content".to_string(),
        });
    }
    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn byte_stream(
        frames: Vec<&'static str>,
    ) -> impl Stream<Item = Result<&'static [u8], Infallible>> {
        futures::stream::iter(frames.into_iter().map(|frame| Ok(frame.as_bytes())))
    }

    #[tokio::test]
    async fn sentinel_termination_concatenates_deltas_in_order() {
        let frames = vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"ab\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"cd\"}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let mut deltas: Vec<String> = Vec::new();
        let mut sink = |delta: &str| deltas.push(delta.to_string());
        let text = collect_sse(byte_stream(frames), Some(&mut sink), DEFAULT_IDLE_TIMEOUT)
            .await
            .expect("stream resolves");

        assert_eq!(text, "abcd");
        assert_eq!(deltas, vec!["ab", "cd"]);
    }

    #[tokio::test]
    async fn malformed_event_between_valid_ones_is_skipped() {
        let frames = vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"ab\"}}]}\n\n",
            "data: not json at all\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"cd\"}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let text = collect_sse(byte_stream(frames), None, DEFAULT_IDLE_TIMEOUT)
            .await
            .expect("stream resolves despite noise");
        assert_eq!(text, "abcd");
    }

    #[tokio::test]
    async fn event_split_across_byte_chunks_reassembles() {
        let frames = vec![
            "data: {\"choices\":[{\"del",
            "ta\":{\"content\":\"ab\"}}]}\n\ndata: [DONE]\n\n",
        ];
        let text = collect_sse(byte_stream(frames), None, DEFAULT_IDLE_TIMEOUT)
            .await
            .expect("stream resolves");
        assert_eq!(text, "ab");
    }

    #[tokio::test]
    async fn early_close_without_sentinel_returns_accumulated_text() {
        let frames = vec!["data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n"];
        let text = collect_sse(byte_stream(frames), None, DEFAULT_IDLE_TIMEOUT)
            .await
            .expect("lenient close");
        assert_eq!(text, "partial");
    }

    #[tokio::test]
    async fn stream_with_zero_content_is_a_protocol_error() {
        let frames = vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let err = collect_sse(byte_stream(frames), None, DEFAULT_IDLE_TIMEOUT)
            .await
            .expect_err("empty stream must fail");
        assert!(matches!(err, CompletionError::Protocol { status: None, .. }));
    }

    #[tokio::test]
    async fn empty_content_fragments_are_not_delivered() {
        let frames = vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let mut deltas: Vec<String> = Vec::new();
        let mut sink = |delta: &str| deltas.push(delta.to_string());
        let text = collect_sse(byte_stream(frames), Some(&mut sink), DEFAULT_IDLE_TIMEOUT)
            .await
            .expect("stream resolves");
        assert_eq!(text, "x");
        assert_eq!(deltas, vec!["x"]);
    }

    #[tokio::test]
    async fn transport_error_mid_stream_surfaces_as_transport() {
        let frames: Vec<Result<&'static [u8], String>> = vec![
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"ab\"}}]}\n\n".as_bytes()),
            Err("connection reset".to_string()),
        ];
        let err = collect_sse(futures::stream::iter(frames), None, DEFAULT_IDLE_TIMEOUT)
            .await
            .expect_err("must fail");
        assert!(matches!(err, CompletionError::Transport(_)));
    }

    #[tokio::test]
    async fn idle_stream_times_out() {
        let pending = futures::stream::pending::<Result<&'static [u8], Infallible>>();
        let err = collect_sse(pending, None, Duration::from_millis(10))
            .await
            .expect_err("must time out");
        assert!(matches!(err, CompletionError::Timeout(_)));
    }

    #[test]
    fn date_placeholder_resolves_in_system_messages_only() {
        let mut system = ChatMessage::system("Today is {{date}}.");
        let mut user = ChatMessage::user("what about {{date}}?");
        resolve_date_placeholder(&mut system, "2026-08-23 10:00");
        resolve_date_placeholder(&mut user, "2026-08-23 10:00");

        assert_eq!(system.content, "Today is 2026-08-23 10:00.");
        assert_eq!(user.content, "what about {{date}}?");
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_network_call() {
        let client = CompletionClient::new(ClientConfig::new("http://127.0.0.1:9", ""));
        let request = CompletionRequest::new("gpt-test", vec![ChatMessage::user("hi")]);
        let err = client.send(&request).await.expect_err("must fail");
        assert!(matches!(err, CompletionError::Configuration(_)));
    }
}

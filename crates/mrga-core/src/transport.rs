//! HTTP streaming capability for the chat consumer.
//!
//! `POST {base}/api/ai/chat-stream` answers with a raw text body that is
//! written incrementally and terminated by connection close.  The transport
//! hands back the body as a stream of byte chunks; decoding and pacing live in
//! the consumer.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use mrga_proto::error::StreamTransportError;
use mrga_proto::protocol::{ChatRequest, Provider};
use reqwest::Client;
use tracing::{debug, warn};

pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, StreamTransportError>>;

#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    /// Open one streaming request.  Errors before the first byte (connect,
    /// non-2xx) are returned here; errors mid-body come through the stream.
    async fn open(
        &self,
        prompt: &str,
        provider: Provider,
    ) -> Result<ChunkStream, StreamTransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    client: Client,
    endpoint: String,
}

impl HttpChatTransport {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/ai/chat-stream", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn open(
        &self,
        prompt: &str,
        provider: Provider,
    ) -> Result<ChunkStream, StreamTransportError> {
        let body = ChatRequest {
            prompt: prompt.to_string(),
            provider,
        };
        debug!(
            "HttpChatTransport: POST {} ({})",
            self.endpoint,
            provider.label()
        );

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("HttpChatTransport: chat service returned {}", status);
            return Err(StreamTransportError::Status(status.as_u16()));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(StreamTransportError::from)
            })
            .boxed())
    }
}

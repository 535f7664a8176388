use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::{format_conversations, Turn};
use crate::model::{VideoReader, VisionLanguageModel};
use crate::qwen3_vl::Quantization;
use crate::{EmbedError, ModelError, ModelErrorKind, ModelInputs, ModelOutput};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection and model identity for a [`RemoteVisionModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteModelOptions {
    /// Base URL of the model runtime. `None` means no runtime is deployed.
    pub endpoint: Option<String>,
    pub model: String,
    pub device: String,
    pub max_length: usize,
    pub quantization: Quantization,
    pub reader: VideoReader,
}

/// Vision-language model served by a model runtime sidecar over HTTP.
///
/// The runtime answers `POST /v1/process` with the raw last hidden state and
/// attention mask, and reports failures as `{"error": {"type", "message"}}`
/// using the model library's own exception class and message.
#[derive(Debug)]
pub struct RemoteVisionModel {
    client: reqwest::Client,
    endpoint: String,
    options: RemoteModelOptions,
}

#[derive(Serialize)]
struct ProcessBody<'a> {
    model: &'a str,
    device: &'a str,
    max_length: usize,
    quantization: &'static str,
    conversations: Vec<Vec<Turn>>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

impl RemoteVisionModel {
    pub fn new(options: RemoteModelOptions) -> Result<Self, EmbedError> {
        let endpoint = options
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                EmbedError::DependenciesMissing("no model runtime endpoint configured".into())
            })?
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|err| EmbedError::DependenciesMissing(err.to_string()))?;

        tracing::info!(
            endpoint = %endpoint,
            model = %options.model,
            device = %options.device,
            quantization = options.quantization.as_str(),
            "vision-language runtime configured"
        );

        Ok(Self {
            client,
            endpoint,
            options,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VisionLanguageModel for RemoteVisionModel {
    async fn process(&self, inputs: &[ModelInputs]) -> Result<ModelOutput, ModelError> {
        let conversations = format_conversations(inputs).await?;

        let body = ProcessBody {
            model: &self.options.model,
            device: &self.options.device,
            max_length: self.options.max_length,
            quantization: self.options.quantization.as_str(),
            conversations,
        };

        let response = self
            .client
            .post(format!("{}/v1/process", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) => ModelError::new(
                    ModelErrorKind::from_type_name(&envelope.error.kind),
                    envelope.error.message,
                ),
                Err(_) => ModelError::new(
                    ModelErrorKind::Other,
                    format!("model runtime returned {status}: {text}"),
                ),
            });
        }

        response.json::<ModelOutput>().await.map_err(transport_error)
    }

    fn device(&self) -> &str {
        &self.options.device
    }

    fn video_reader(&self) -> VideoReader {
        self.options.reader
    }

    async fn release_cached_memory(&self) {
        let result = self
            .client
            .post(format!("{}/v1/cleanup", self.endpoint))
            .send()
            .await
            .and_then(|response| response.error_for_status());
        if let Err(err) = result {
            tracing::debug!(error = %err, "model runtime cleanup failed");
        }
    }
}

fn transport_error(err: reqwest::Error) -> ModelError {
    ModelError::new(ModelErrorKind::Other, format!("model runtime unreachable: {err}"))
}

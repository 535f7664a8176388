use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::budget::GenerationLimits;
use crate::model::{SpeechModel, SpeechRequest};
use crate::{SpeechError, SpeechErrorKind, TranscribeError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Speech model hosted by a model runtime sidecar.
///
/// The runtime shares the upload volume with this process, so audio is passed
/// by path rather than by value.
#[derive(Debug)]
pub struct RemoteSpeechModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    device: String,
    limits: OnceCell<Option<GenerationLimits>>,
}

#[derive(Serialize)]
struct TranscribeBody<'a> {
    model: &'a str,
    device: &'a str,
    audio_path: &'a str,
    #[serde(flatten)]
    request: &'a SpeechRequest,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: String,
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

impl RemoteSpeechModel {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        device: impl Into<String>,
    ) -> Result<Self, TranscribeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|err| TranscribeError::DependenciesMissing(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
            device: device.into(),
            limits: OnceCell::new(),
        })
    }

    async fn fetch_limits(&self) -> Result<Option<GenerationLimits>, SpeechError> {
        let url = format!("{}/v1/generation-config", self.endpoint);
        let response = self
            .client
            .get(url)
            .query(&[("model", self.model.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        response
            .json::<GenerationLimits>()
            .await
            .map(Some)
            .map_err(transport_error)
    }
}

#[async_trait]
impl SpeechModel for RemoteSpeechModel {
    async fn transcribe(&self, audio: &Path, request: &SpeechRequest) -> Result<String, SpeechError> {
        let audio_path = audio.to_string_lossy();
        let body = TranscribeBody {
            model: &self.model,
            device: &self.device,
            audio_path: &audio_path,
            request,
        };

        let response = self
            .client
            .post(format!("{}/v1/transcribe", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let parsed: TranscribeResponse = response.json().await.map_err(transport_error)?;
        Ok(parsed.text)
    }

    async fn generation_limits(&self) -> Result<Option<GenerationLimits>, SpeechError> {
        self.limits
            .get_or_try_init(|| self.fetch_limits())
            .await
            .copied()
    }

    fn device(&self) -> &str {
        &self.device
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SpeechError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) => SpeechError::new(
            SpeechErrorKind::from_type_name(&envelope.error.kind),
            envelope.error.message,
        ),
        Err(_) => SpeechError::new(
            SpeechErrorKind::Other,
            format!("speech runtime returned {status}: {text}"),
        ),
    })
}

fn transport_error(err: reqwest::Error) -> SpeechError {
    SpeechError::new(SpeechErrorKind::Other, format!("speech runtime unreachable: {err}"))
}

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use media::{is_audio_path, AudioDemuxer};

use crate::backend::SpeechBackend;
use crate::budget::generation_budget;
use crate::model::{SpeechModel, SpeechRequest};
use crate::TranscribeError;

/// Configuration for a [`Transcriber`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriberOptions {
    pub language: Option<String>,
    /// Upper bound on generated tokens (`WHISPER_MAX_NEW_TOKENS`).
    pub max_new_tokens: Option<u32>,
}

/// Turns a media file into text.
///
/// Non-audio containers are demuxed to a temporary mono 16 kHz WAV first. The
/// temporary file lives exactly as long as one `transcribe` call.
pub struct Transcriber {
    backend: SpeechBackend,
    model: Arc<dyn SpeechModel>,
    demuxer: AudioDemuxer,
    options: TranscriberOptions,
}

impl std::fmt::Debug for Transcriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcriber")
            .field("backend", &self.backend)
            .field("device", &self.model.device())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Transcriber {
    pub fn new(
        backend: SpeechBackend,
        model: Arc<dyn SpeechModel>,
        demuxer: AudioDemuxer,
        options: TranscriberOptions,
    ) -> Self {
        Self {
            backend,
            model,
            demuxer,
            options,
        }
    }

    pub fn backend(&self) -> SpeechBackend {
        self.backend
    }

    /// Transcribe `path`. A source without an audio stream yields `""`.
    pub async fn transcribe(&self, path: &Path) -> Result<String, TranscribeError> {
        let started = Instant::now();

        // Keeps the extracted WAV alive until the model is done with it.
        let extracted = if is_audio_path(path) {
            None
        } else {
            match self.demuxer.extract_wav(path).await? {
                Some(wav) => Some(wav),
                None => return Ok(String::new()),
            }
        };
        let audio = extracted.as_ref().map_or(path, |wav| wav.path());

        tracing::info!(
            path = %path.display(),
            backend = %self.backend,
            demuxed = extracted.is_some(),
            "transcription start"
        );

        let request = self.request().await?;
        let raw = match self.model.transcribe(audio, &request).await {
            Ok(text) => text,
            Err(err) if self.backend == SpeechBackend::Pipeline && err.requires_timestamps() => {
                tracing::info!("long-form audio, retrying with timestamps");
                let retry = SpeechRequest {
                    return_timestamps: true,
                    ..request
                };
                self.model.transcribe(audio, &retry).await?
            }
            Err(err) => return Err(err.into()),
        };

        let text = collapse_whitespace(&raw);
        tracing::info!(
            path = %path.display(),
            chars = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "transcription done"
        );
        Ok(text)
    }

    async fn request(&self) -> Result<SpeechRequest, TranscribeError> {
        let mut request = SpeechRequest::transcribe(self.options.language.clone());
        match self.backend {
            SpeechBackend::Whisper => {
                request.fp16 = self.model.device() == "cuda";
            }
            SpeechBackend::Pipeline => {
                if let Some(limits) = self.model.generation_limits().await? {
                    let budget = generation_budget(&limits, self.options.max_new_tokens);
                    tracing::debug!(?limits, budget, "generation budget");
                    request.max_new_tokens = Some(budget);
                } else {
                    request.max_new_tokens = self.options.max_new_tokens.filter(|cap| *cap > 0);
                }
            }
        }
        Ok(request)
    }
}

/// Trim and collapse every whitespace run to one space.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

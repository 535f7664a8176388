//! Load-once model selection.
//!
//! Model construction is expensive, so each kind of model lives in a
//! [`FingerprintSlot`]: one cached instance keyed by a string built from every
//! setting that affects model identity. A changed fingerprint replaces the
//! instance. Concurrent cold starts may build twice; the last one stored wins.

use std::sync::{Arc, Mutex, PoisonError};

use media::{AudioDemuxer, FrameExtractor, Toolchain, VideoProbe};
use semantic::{
    Backend, BackendKind, DeterministicBackend, EmbedError, Embedder, Qwen3VlBackend,
    Qwen3VlOptions, RemoteModelOptions, RemoteVisionModel,
};
use transcribe::{RemoteSpeechModel, TranscribeError, Transcriber, TranscriberOptions};

use crate::config::{Settings, SettingsError};

/// Holds at most one value, tagged with the fingerprint it was built for.
#[derive(Debug)]
pub struct FingerprintSlot<T> {
    slot: Mutex<Option<(String, Arc<T>)>>,
}

impl<T> Default for FingerprintSlot<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> FingerprintSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `fingerprint`, or build and store a new one.
    ///
    /// `build` runs without the lock held. A failed build leaves the slot as it was.
    pub fn get_or_try_insert_with<E, F>(&self, fingerprint: &str, build: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get(fingerprint) {
            return Ok(value);
        }

        let value = Arc::new(build()?);
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((previous, _)) = slot.as_ref() {
            tracing::info!(previous = %previous, current = %fingerprint, "replacing cached model");
        }
        *slot = Some((fingerprint.to_string(), Arc::clone(&value)));
        Ok(value)
    }

    pub fn get(&self, fingerprint: &str) -> Option<Arc<T>> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some((cached, value)) if cached == fingerprint => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn fingerprint(&self) -> Option<String> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|(fingerprint, _)| fingerprint.clone())
    }
}

/// Builds and caches the embedding backend and the standalone transcriber.
#[derive(Debug, Default)]
pub struct BackendSelector {
    backends: FingerprintSlot<Backend>,
    transcribers: FingerprintSlot<Transcriber>,
}

impl BackendSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend for the current settings. Unknown names are `NotImplemented`.
    pub fn backend(&self, settings: &Settings) -> Result<Arc<Backend>, EmbedError> {
        match settings.backend_kind()? {
            BackendKind::Deterministic => Ok(Arc::new(Backend::Deterministic(DeterministicBackend))),
            BackendKind::Qwen3Vl => self
                .backends
                .get_or_try_insert_with(&settings.qwen_fingerprint(), || self.build_qwen(settings)),
        }
    }

    /// Transcriber for the current settings. A missing speech runtime endpoint
    /// is `DependenciesMissing`.
    pub fn transcriber(&self, settings: &Settings) -> Result<Arc<Transcriber>, TranscribeError> {
        self.transcribers
            .get_or_try_insert_with(&settings.transcriber_fingerprint(), || build_transcriber(settings))
    }

    fn build_qwen(&self, settings: &Settings) -> Result<Backend, EmbedError> {
        let toolchain = Toolchain::discover(&settings.tool_overrides());
        let reader = settings.video_reader().map_err(invalid_setting)?;

        let model = RemoteVisionModel::new(RemoteModelOptions {
            endpoint: settings.qwen_endpoint().map(str::to_string),
            model: settings.qwen_model.clone(),
            device: settings.qwen_device.clone(),
            max_length: settings.qwen_max_length,
            quantization: settings.quantization().map_err(invalid_setting)?,
            reader: reader.unwrap_or_default(),
        })?;
        let embedder = Embedder::new(Arc::new(model), settings.cleanup_policy());

        // Transcription can be switched on per request, so build it whenever a
        // speech runtime exists, not only when it is enabled by default.
        let transcriber = match self.transcriber(settings) {
            Ok(transcriber) => Some(transcriber),
            Err(TranscribeError::DependenciesMissing(reason)) => {
                tracing::info!(%reason, "no speech runtime, transcription unavailable");
                None
            }
            Err(err) => return Err(err.into()),
        };

        let options = Qwen3VlOptions {
            video_fps: settings.qwen_video_fps,
            video_max_frames: settings.qwen_video_max_frames,
            video_target_frames: settings.qwen_video_target_frames,
            extractor: settings.extractor_policy(),
            reader,
            transcribe_enabled: settings.transcribe_enabled,
        };

        tracing::info!(
            model = %settings.qwen_model,
            device = %settings.qwen_device,
            batch_size = settings.qwen_batch_size,
            batch_wait_ms = settings.qwen_batch_wait_ms,
            ffmpeg = ?toolchain.ffmpeg(),
            ffprobe = ?toolchain.ffprobe(),
            "constructed qwen3_vl backend"
        );

        Ok(Backend::Qwen3Vl(Qwen3VlBackend::new(
            options,
            embedder,
            VideoProbe::new(&toolchain),
            FrameExtractor::new(&toolchain),
            transcriber,
        )))
    }
}

fn build_transcriber(settings: &Settings) -> Result<Transcriber, TranscribeError> {
    let backend = settings.speech_backend()?;
    let endpoint = settings.whisper_endpoint().ok_or_else(|| {
        TranscribeError::DependenciesMissing("no speech runtime endpoint configured".into())
    })?;
    let model = RemoteSpeechModel::new(
        endpoint,
        settings.whisper_model.clone(),
        settings.whisper_device.clone(),
    )?;
    let toolchain = Toolchain::discover(&settings.tool_overrides());

    tracing::info!(
        backend = %backend,
        model = %settings.whisper_model,
        device = %settings.whisper_device,
        "constructed transcriber"
    );

    Ok(Transcriber::new(
        backend,
        Arc::new(model),
        AudioDemuxer::new(&toolchain),
        TranscriberOptions {
            language: settings.whisper_language().map(str::to_string),
            max_new_tokens: settings.whisper_max_new_tokens,
        },
    ))
}

/// Settings are validated at load, so this only fires for values changed
/// afterwards. It is the operator's problem, not the caller's.
fn invalid_setting(err: SettingsError) -> EmbedError {
    EmbedError::DependenciesMissing(format!("backend misconfigured: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn slot_reuses_value_for_same_fingerprint() {
        let slot = FingerprintSlot::new();
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(builds.load(Ordering::SeqCst))
        };

        let a = slot.get_or_try_insert_with("k1", build).unwrap();
        let b = slot.get_or_try_insert_with("k1", build).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn slot_replaces_on_new_fingerprint() {
        let slot = FingerprintSlot::new();
        let a = slot.get_or_try_insert_with("k1", || Ok::<_, ()>(1)).unwrap();
        let b = slot.get_or_try_insert_with("k2", || Ok::<_, ()>(2)).unwrap();
        assert_eq!((*a, *b), (1, 2));
        assert_eq!(slot.fingerprint().as_deref(), Some("k2"));
        assert!(slot.get("k1").is_none());
    }

    #[test]
    fn misconfigured_qwen_is_a_server_side_failure() {
        let mut settings = Settings::from_pairs([("EMBEDDING_BACKEND", "qwen3_vl")]).unwrap();
        settings.qwen_quantization = "int3".into();

        let selector = BackendSelector::new();
        let err = selector.backend(&settings).unwrap_err();
        assert!(
            matches!(err, EmbedError::DependenciesMissing(ref msg) if msg.contains("QWEN_QUANTIZATION"))
        );
        assert!(selector.backends.fingerprint().is_none());

        settings.qwen_quantization = "none".into();
        settings.qwen_video_reader = Some("opencv".into());
        let err = selector.backend(&settings).unwrap_err();
        assert!(
            matches!(err, EmbedError::DependenciesMissing(ref msg) if msg.contains("QWEN_VIDEO_READER"))
        );
    }

    #[test]
    fn failed_build_keeps_previous_entry() {
        let slot = FingerprintSlot::new();
        slot.get_or_try_insert_with("k1", || Ok::<_, &str>(1)).unwrap();
        let err = slot.get_or_try_insert_with("k2", || Err::<i32, _>("boom")).unwrap_err();
        assert_eq!(err, "boom");
        assert_eq!(slot.fingerprint().as_deref(), Some("k1"));
    }
}

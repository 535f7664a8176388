#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use embedding_worker::{ModelError, ModelInputs, ModelOutput, VideoInput, VideoReader, VisionLanguageModel};

/// What the scripted model saw on one call.
#[derive(Debug, Clone)]
pub struct SeenCall {
    pub max_frames: Option<usize>,
    pub fps: Option<f64>,
    pub sample_fps: Option<f64>,
    pub text: Option<String>,
    pub frame_sizes: Option<Vec<(u32, u32)>>,
    pub path: bool,
}

/// Fails with the queued errors in order, then succeeds.
pub struct ScriptedModel {
    failures: Mutex<VecDeque<ModelError>>,
    fail_forever: Option<ModelError>,
    pub calls: Mutex<Vec<SeenCall>>,
    pub releases: AtomicUsize,
    device: &'static str,
    reader: VideoReader,
}

impl ScriptedModel {
    pub fn new(failures: Vec<ModelError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            fail_forever: None,
            calls: Mutex::new(Vec::new()),
            releases: AtomicUsize::new(0),
            device: "cpu",
            reader: VideoReader::TorchVision,
        }
    }

    pub fn always_failing(err: ModelError) -> Self {
        Self {
            fail_forever: Some(err),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_reader(mut self, reader: VideoReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn calls(&self) -> Vec<SeenCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionLanguageModel for ScriptedModel {
    async fn process(&self, inputs: &[ModelInputs]) -> Result<ModelOutput, ModelError> {
        let input = &inputs[0];
        self.calls.lock().unwrap().push(SeenCall {
            max_frames: input.max_frames,
            fps: input.fps,
            sample_fps: input.sample_fps,
            text: input.text.clone(),
            frame_sizes: match &input.video {
                Some(VideoInput::Frames(frames)) => {
                    Some(frames.iter().map(|f| (f.width(), f.height())).collect())
                }
                _ => None,
            },
            path: matches!(input.video, Some(VideoInput::Path(_))),
        });

        if let Some(err) = &self.fail_forever {
            return Err(err.clone());
        }
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        Ok(ModelOutput {
            last_hidden_state: inputs
                .iter()
                .map(|_| vec![vec![0.5; 16], (1..=16).map(|i| i as f32).collect(), vec![0.0; 16]])
                .collect(),
            attention_mask: inputs.iter().map(|_| vec![1, 1, 0]).collect(),
        })
    }

    fn device(&self) -> &str {
        self.device
    }

    fn video_reader(&self) -> VideoReader {
        self.reader
    }

    async fn release_cached_memory(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub const TOKEN_MISMATCH: &str = "Mismatch in `video` token count between text and `input_ids`. \
                                  Got ids=[8052] and text=[23040].";
pub const FRAME_STACK: &str =
    "stack expects each tensor to be equal size, but got [3, 360, 640] at entry 0 and [3, 480, 640] at entry 1";

pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

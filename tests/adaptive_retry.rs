mod support;

use std::sync::Arc;

use embedding_worker::{
    CleanupPolicy, Embedder, FrameExtractor, MAX_GUARDED_ATTEMPTS, ModelError, ModelErrorKind,
    ModelInputs, Toolchain, VideoInput, process_with_adaptive_frames,
};
use image::{DynamicImage, Rgb, RgbImage};
use support::{FRAME_STACK, ScriptedModel, TOKEN_MISMATCH};

fn frame(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 120, 30])))
}

fn no_tools() -> FrameExtractor {
    FrameExtractor::new(&Toolchain::with_paths(None, None))
}

fn path_input(max_frames: usize, duration: Option<f64>) -> ModelInputs {
    ModelInputs {
        video: Some(VideoInput::Path("/tmp/clip.mp4".into())),
        text: Some("a caption".into()),
        fps: Some(1.0),
        sample_fps: Some(1.0),
        max_frames: Some(max_frames),
        duration_seconds: duration,
        ..ModelInputs::default()
    }
}

#[tokio::test]
async fn token_mismatch_shrinks_frames_by_quoted_ratio() {
    let model = Arc::new(ScriptedModel::new(vec![ModelError::value(TOKEN_MISMATCH)]));
    let embedder = Embedder::new(model.clone(), CleanupPolicy::Never);

    let out = process_with_adaptive_frames(&embedder, &no_tools(), path_input(64, Some(30.0)))
        .await
        .unwrap();
    assert_eq!(out.len(), 1);

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].max_frames, Some(64));
    assert_eq!(calls[1].max_frames, Some(22));
    let fps = calls[1].fps.unwrap();
    assert!((fps - 22.0 / 30.0).abs() < 1e-9);
    assert_eq!(calls[1].sample_fps, calls[1].fps);
    assert!(calls[1].path);
}

#[tokio::test]
async fn token_mismatch_without_duration_keeps_fps() {
    let model = Arc::new(ScriptedModel::new(vec![ModelError::value(
        "Mismatch in `video` token count between text and `input_ids`",
    )]));
    let embedder = Embedder::new(model.clone(), CleanupPolicy::Never);

    process_with_adaptive_frames(&embedder, &no_tools(), path_input(64, None))
        .await
        .unwrap();

    let calls = model.calls();
    assert_eq!(calls[1].max_frames, Some(32));
    assert_eq!(calls[1].fps, Some(1.0));
}

#[tokio::test]
async fn persistent_mismatch_stops_after_final_attempt() {
    let model = Arc::new(ScriptedModel::always_failing(ModelError::value(TOKEN_MISMATCH)));
    let embedder = Embedder::new(model.clone(), CleanupPolicy::Always);

    let err = process_with_adaptive_frames(&embedder, &no_tools(), path_input(4096, Some(60.0)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ModelErrorKind::Value);

    let calls = model.calls();
    assert_eq!(calls.len(), MAX_GUARDED_ATTEMPTS + 1);
    // Every guarded retry is preceded by exactly one cleanup.
    assert_eq!(model.releases(), MAX_GUARDED_ATTEMPTS);
    let caps: Vec<usize> = calls.iter().map(|c| c.max_frames.unwrap()).collect();
    assert!(caps.windows(2).all(|w| w[1] < w[0]), "{caps:?}");
}

#[tokio::test]
async fn token_mismatch_at_single_frame_is_fatal() {
    let model = Arc::new(ScriptedModel::new(vec![ModelError::value(TOKEN_MISMATCH)]));
    let embedder = Embedder::new(model.clone(), CleanupPolicy::Never);

    let err = process_with_adaptive_frames(&embedder, &no_tools(), path_input(1, Some(10.0)))
        .await
        .unwrap_err();
    assert!(err.message.contains("Mismatch"));
    assert_eq!(model.calls().len(), 1);
}

#[tokio::test]
async fn token_mismatch_downsamples_frame_lists() {
    let model = Arc::new(ScriptedModel::new(vec![ModelError::value(
        "Mismatch in `video` token count between text and `input_ids`. Got ids=[1] and text=[2].",
    )]));
    let embedder = Embedder::new(model.clone(), CleanupPolicy::Never);

    let input = ModelInputs {
        video: Some(VideoInput::Frames((0..10).map(|_| frame(8, 8)).collect())),
        max_frames: Some(10),
        fps: Some(1.0),
        ..ModelInputs::default()
    };
    process_with_adaptive_frames(&embedder, &no_tools(), input)
        .await
        .unwrap();

    let calls = model.calls();
    assert_eq!(calls[0].frame_sizes.as_ref().unwrap().len(), 10);
    assert_eq!(calls[1].max_frames, Some(5));
    assert_eq!(calls[1].frame_sizes.as_ref().unwrap().len(), 5);
}

#[tokio::test]
async fn frame_size_mismatch_normalizes_frames() {
    let model = Arc::new(ScriptedModel::new(vec![ModelError::runtime(FRAME_STACK)]));
    let embedder = Embedder::new(model.clone(), CleanupPolicy::Never);

    let input = ModelInputs {
        video: Some(VideoInput::Frames(vec![frame(64, 36), frame(64, 48), frame(64, 36)])),
        max_frames: Some(3),
        ..ModelInputs::default()
    };
    process_with_adaptive_frames(&embedder, &no_tools(), input)
        .await
        .unwrap();

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].frame_sizes.as_deref(),
        Some(&[(64, 36), (64, 36), (64, 36)][..])
    );
}

#[tokio::test]
async fn frame_size_mismatch_on_path_without_ffmpeg_is_fatal() {
    let model = Arc::new(ScriptedModel::new(vec![ModelError::runtime(FRAME_STACK)]));
    let embedder = Embedder::new(model.clone(), CleanupPolicy::Never);

    let err = process_with_adaptive_frames(&embedder, &no_tools(), path_input(8, Some(8.0)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ModelErrorKind::Runtime);
    assert_eq!(model.calls().len(), 1);
}

#[tokio::test]
async fn unrelated_errors_are_not_retried() {
    let model = Arc::new(ScriptedModel::new(vec![ModelError::runtime(
        "CUDA out of memory. Tried to allocate 2.00 GiB",
    )]));
    let embedder = Embedder::new(model.clone(), CleanupPolicy::Always);

    assert!(
        process_with_adaptive_frames(&embedder, &no_tools(), path_input(8, Some(8.0)))
            .await
            .is_err()
    );
    assert_eq!(model.calls().len(), 1);
    assert_eq!(model.releases(), 0);
}

#[tokio::test]
async fn pooled_vector_is_unit_length() {
    let model = Arc::new(ScriptedModel::new(Vec::new()));
    let embedder = Embedder::new(model, CleanupPolicy::Never);
    let out = process_with_adaptive_frames(&embedder, &no_tools(), path_input(8, None))
        .await
        .unwrap();
    assert!((support::norm(&out[0]) - 1.0).abs() < 1e-6);
}

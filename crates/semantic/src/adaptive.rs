//! Adaptive retry around the raw model call.
//!
//! The model's token budget and its tolerance for mixed frame sizes are only
//! discovered when a call fails. Two failure shapes are repairable: frames of
//! unequal size (normalize them, extracting first if the model was reading a
//! path) and a video/text token-count mismatch (shrink `max_frames` in
//! proportion to the counts the error quotes). Everything else propagates.

use std::slice;

use media::{downsample_frames, normalize_frame_sizes_blocking, FrameExtractor};

use crate::model::Embedder;
use crate::{InputMismatch, ModelError, ModelInputs, TokenCounts, VideoInput};

/// Guarded attempts before the final unguarded one.
pub const MAX_GUARDED_ATTEMPTS: usize = 6;

/// Run `base` through the model, repairing known input mismatches between
/// attempts. At most [`MAX_GUARDED_ATTEMPTS`] + 1 model calls are made.
pub async fn process_with_adaptive_frames(
    embedder: &Embedder,
    extractor: &FrameExtractor,
    base: ModelInputs,
) -> Result<Vec<Vec<f32>>, ModelError> {
    let duration = base
        .duration_seconds
        .filter(|d| d.is_finite() && *d > 0.0);
    let mut current = base;

    for attempt in 1..=MAX_GUARDED_ATTEMPTS {
        let err = match embedder.process(slice::from_ref(&current)).await {
            Ok(embeddings) => return Ok(embeddings),
            Err(err) => err,
        };

        match err.classify() {
            Some(InputMismatch::FrameSizeMismatch) => {
                if !repair_frame_sizes(&mut current, extractor).await {
                    return Err(err);
                }
                tracing::warn!(
                    attempt,
                    kind = "frame_size_mismatch",
                    frames = frame_count(&current),
                    "retrying with normalized frames"
                );
            }
            Some(InputMismatch::VideoTokenMismatch { counts }) => {
                let previous = match current.max_frames {
                    Some(max_frames) if max_frames > 1 => max_frames,
                    _ => return Err(err),
                };
                let next = reduce_max_frames(previous, counts);
                shrink_to(&mut current, next, duration);
                tracing::warn!(
                    attempt,
                    kind = "token_mismatch",
                    max_frames_before = previous,
                    max_frames_after = next,
                    fps = ?current.fps,
                    "retrying with fewer frames"
                );
            }
            None => return Err(err),
        }

        embedder.maybe_cleanup().await;
    }

    embedder.process(slice::from_ref(&current)).await
}

/// Next `max_frames` after a token-count mismatch.
///
/// With quoted counts the cap scales by `ids / text`; an unusable ratio halves
/// it. The result is always strictly below `current` and never below 1.
pub fn reduce_max_frames(current: usize, counts: Option<TokenCounts>) -> usize {
    let halved = (current / 2).max(1);
    let candidate = match counts {
        Some(TokenCounts { ids, text }) if ids > 0 && text > 0 => {
            let scaled = (current as u128 * u128::from(ids) / u128::from(text)) as usize;
            if scaled == 0 {
                1
            } else if scaled >= current {
                current.saturating_sub(1).max(1)
            } else {
                scaled
            }
        }
        _ => halved,
    };

    if candidate >= current {
        halved
    } else {
        candidate
    }
}

/// Apply a new frame cap. `fps` follows the cap only when the duration is
/// known; otherwise it is left as is.
fn shrink_to(input: &mut ModelInputs, max_frames: usize, duration: Option<f64>) {
    input.max_frames = Some(max_frames);
    if let Some(duration) = duration {
        let fps = max_frames as f64 / duration;
        input.fps = Some(fps);
        input.sample_fps = Some(fps);
    }
    if let Some(VideoInput::Frames(frames)) = &mut input.video {
        let all = std::mem::take(frames);
        *frames = downsample_frames(all, max_frames);
    }
}

/// Replace the input's video with a same-size frame set. Returns `false`
/// (leaving a path input untouched) when no usable frames could be produced.
async fn repair_frame_sizes(input: &mut ModelInputs, extractor: &FrameExtractor) -> bool {
    match input.video.take() {
        Some(VideoInput::Frames(frames)) => match normalize_frame_sizes_blocking(frames).await {
            Some(frames) => {
                input.video = Some(VideoInput::Frames(frames));
                true
            }
            None => false,
        },
        Some(VideoInput::Path(path)) => {
            let fps = input.fps.unwrap_or(1.0);
            let max_frames = input.max_frames.unwrap_or(1);
            match extractor.extract(&path, fps, max_frames).await {
                Some(frames) => {
                    input.video = Some(VideoInput::Frames(frames));
                    true
                }
                None => {
                    input.video = Some(VideoInput::Path(path));
                    false
                }
            }
        }
        None => false,
    }
}

fn frame_count(input: &ModelInputs) -> usize {
    match &input.video {
        Some(VideoInput::Frames(frames)) => frames.len(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(ids: u64, text: u64) -> Option<TokenCounts> {
        Some(TokenCounts { ids, text })
    }

    #[test]
    fn scales_by_quoted_ratio() {
        assert_eq!(reduce_max_frames(64, counts(8052, 23040)), 22);
    }

    #[test]
    fn missing_counts_halve() {
        assert_eq!(reduce_max_frames(64, None), 32);
        assert_eq!(reduce_max_frames(3, None), 1);
    }

    #[test]
    fn zero_counts_halve() {
        assert_eq!(reduce_max_frames(10, counts(0, 100)), 5);
        assert_eq!(reduce_max_frames(10, counts(100, 0)), 5);
    }

    #[test]
    fn ratio_above_one_steps_down_by_one() {
        assert_eq!(reduce_max_frames(10, counts(300, 100)), 9);
    }

    #[test]
    fn tiny_ratio_floors_at_one() {
        assert_eq!(reduce_max_frames(10, counts(1, 100_000)), 1);
    }

    #[test]
    fn result_is_always_smaller_and_positive() {
        for current in 2..200usize {
            for (ids, text) in [(1, 1), (1, 2), (7, 3), (5000, 23040), (0, 0)] {
                let next = reduce_max_frames(current, counts(ids, text));
                assert!(next >= 1 && next < current, "current={current} ids={ids} text={text}");
            }
        }
    }

    #[test]
    fn shrink_recomputes_fps_from_duration() {
        let mut input = ModelInputs {
            fps: Some(64.0 / 30.0),
            max_frames: Some(64),
            duration_seconds: Some(30.0),
            ..ModelInputs::default()
        };
        shrink_to(&mut input, 22, Some(30.0));
        assert_eq!(input.max_frames, Some(22));
        assert!((input.fps.unwrap() - 22.0 / 30.0).abs() < 1e-12);
        assert_eq!(input.fps, input.sample_fps);
    }

    #[test]
    fn shrink_keeps_fps_when_duration_unknown() {
        let mut input = ModelInputs {
            fps: Some(1.0),
            sample_fps: Some(1.0),
            max_frames: Some(64),
            ..ModelInputs::default()
        };
        shrink_to(&mut input, 32, None);
        assert_eq!(input.max_frames, Some(32));
        assert_eq!(input.fps, Some(1.0));
    }

    #[test]
    fn shrink_downsamples_frame_lists_and_keeps_paths() {
        use image::{DynamicImage, RgbImage};

        let frames = (0..10)
            .map(|i| DynamicImage::ImageRgb8(RgbImage::new(i + 1, 1)))
            .collect();
        let mut input = ModelInputs {
            video: Some(VideoInput::Frames(frames)),
            max_frames: Some(10),
            ..ModelInputs::default()
        };
        shrink_to(&mut input, 4, None);
        match &input.video {
            Some(VideoInput::Frames(frames)) => {
                let widths: Vec<u32> = frames.iter().map(|f| f.width()).collect();
                assert_eq!(widths, vec![1, 4, 7, 10]);
            }
            other => panic!("unexpected video: {other:?}"),
        }

        let mut input = ModelInputs {
            video: Some(VideoInput::Path("/tmp/a.mp4".into())),
            max_frames: Some(10),
            ..ModelInputs::default()
        };
        shrink_to(&mut input, 5, None);
        assert!(matches!(input.video, Some(VideoInput::Path(_))));
    }
}

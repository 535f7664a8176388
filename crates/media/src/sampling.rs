/// Frame sampling parameters handed to the model for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub fps: f64,
    pub max_frames: usize,
}

/// Pick `fps`/`max_frames` so that exactly `target` frames are spread evenly over
/// the clip, where `target = min(base_max_frames, target_frames)`.
///
/// - `target_frames <= 0` disables targeting: `(base_fps, max(base_max_frames, 1))`.
/// - Unknown or non-positive `duration`: `(base_fps, target)`.
/// - Otherwise: `(target / duration, target)`.
pub fn compute_sampling_params(
    duration_seconds: Option<f64>,
    base_fps: f64,
    base_max_frames: usize,
    target_frames: i64,
) -> SamplingParams {
    let max_frames = base_max_frames.max(1);

    if target_frames <= 0 {
        return SamplingParams {
            fps: base_fps,
            max_frames,
        };
    }

    let target = max_frames.min(usize::try_from(target_frames).unwrap_or(usize::MAX));

    match duration_seconds {
        Some(duration) if duration.is_finite() && duration > 0.0 => SamplingParams {
            fps: target as f64 / duration,
            max_frames: target,
        },
        _ => SamplingParams {
            fps: base_fps,
            max_frames: target,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_second_clip_ten_frames() {
        let p = compute_sampling_params(Some(30.0), 1.0, 64, 10);
        assert_eq!(p.max_frames, 10);
        assert!((p.fps - 10.0 / 30.0).abs() < 1e-12);
        assert!((p.fps - 0.333).abs() < 1e-3);
    }

    #[test]
    fn ten_minute_clip_ten_frames() {
        let p = compute_sampling_params(Some(600.0), 1.0, 64, 10);
        assert_eq!(p.max_frames, 10);
        assert!((p.fps - 0.0167).abs() < 1e-4);
    }

    #[test]
    fn target_is_exact_for_any_duration() {
        for duration in [0.5, 1.0, 7.25, 30.0, 600.0, 7200.0] {
            for target in 1..=64_i64 {
                let p = compute_sampling_params(Some(duration), 2.0, 64, target);
                assert_eq!(p.max_frames, target as usize);
                assert!((p.fps - target as f64 / duration).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn base_cap_limits_target() {
        let p = compute_sampling_params(Some(60.0), 1.0, 8, 10);
        assert_eq!(p.max_frames, 8);
        assert!((p.fps - 8.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn disabled_target_passes_through() {
        let p = compute_sampling_params(Some(60.0), 2.5, 32, 0);
        assert_eq!(p, SamplingParams { fps: 2.5, max_frames: 32 });

        let p = compute_sampling_params(Some(60.0), 2.5, 32, -4);
        assert_eq!(p, SamplingParams { fps: 2.5, max_frames: 32 });
    }

    #[test]
    fn disabled_target_still_floors_max_frames() {
        let p = compute_sampling_params(None, 1.0, 0, 0);
        assert_eq!(p.max_frames, 1);
    }

    #[test]
    fn unknown_duration_keeps_base_fps() {
        let p = compute_sampling_params(None, 1.0, 64, 10);
        assert_eq!(p, SamplingParams { fps: 1.0, max_frames: 10 });

        let p = compute_sampling_params(Some(0.0), 1.0, 64, 10);
        assert_eq!(p, SamplingParams { fps: 1.0, max_frames: 10 });

        let p = compute_sampling_params(Some(-5.0), 1.0, 64, 10);
        assert_eq!(p, SamplingParams { fps: 1.0, max_frames: 10 });
    }

    #[test]
    fn deterministic() {
        let a = compute_sampling_params(Some(42.0), 1.0, 64, 10);
        let b = compute_sampling_params(Some(42.0), 1.0, 64, 10);
        assert_eq!(a, b);
    }
}

use std::collections::BTreeSet;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

/// Bring every frame to one pixel size so the model can stack them.
///
/// Frames that already agree are returned untouched. Otherwise the most frequent
/// `(width, height)` wins (ties go to the larger area, then to the size seen
/// first), every frame is converted to RGB, and frames of a different size are
/// letterboxed onto a black canvas of the winning size.
///
/// Returns `None` for an empty frame set, which callers treat as "nothing usable".
pub fn normalize_frame_sizes(frames: Vec<DynamicImage>) -> Option<Vec<DynamicImage>> {
    if frames.is_empty() {
        return None;
    }

    let sizes: Vec<(u32, u32)> = frames.iter().map(|frame| frame.dimensions()).collect();
    if sizes.iter().all(|size| *size == sizes[0]) {
        return Some(frames);
    }

    let target = canonical_size(&sizes)?;

    let normalized: Vec<DynamicImage> = frames
        .into_iter()
        .map(|frame| {
            if frame.dimensions() == target {
                DynamicImage::ImageRgb8(frame.into_rgb8())
            } else {
                letterbox(&frame, target)
            }
        })
        .collect();

    let distinct: BTreeSet<(u32, u32)> = sizes.into_iter().collect();
    tracing::warn!(
        sizes = ?distinct,
        target_size = ?target,
        frames = normalized.len(),
        "normalized frames to a common size"
    );

    Some(normalized)
}

/// [`normalize_frame_sizes`] on the blocking pool, for callers on async worker threads.
pub async fn normalize_frame_sizes_blocking(frames: Vec<DynamicImage>) -> Option<Vec<DynamicImage>> {
    match tokio::task::spawn_blocking(move || normalize_frame_sizes(frames)).await {
        Ok(frames) => frames,
        Err(err) => {
            tracing::warn!(error = %err, "frame normalization task failed");
            None
        }
    }
}

/// Majority size, tie-broken by larger area, then by first appearance.
pub fn canonical_size(sizes: &[(u32, u32)]) -> Option<(u32, u32)> {
    let mut counts: Vec<((u32, u32), usize)> = Vec::new();
    for size in sizes {
        match counts.iter_mut().find(|(seen, _)| seen == size) {
            Some((_, count)) => *count += 1,
            None => counts.push((*size, 1)),
        }
    }

    let mut best: Option<((u32, u32), usize)> = None;
    for (size, count) in counts {
        let better = match best {
            None => true,
            Some((best_size, best_count)) => {
                (count, area(size)) > (best_count, area(best_size))
            }
        };
        if better {
            best = Some((size, count));
        }
    }
    best.map(|(size, _)| size)
}

fn area((width, height): (u32, u32)) -> u64 {
    u64::from(width) * u64::from(height)
}

/// Resize preserving aspect ratio, then centre on a black `target` canvas.
fn letterbox(frame: &DynamicImage, (target_w, target_h): (u32, u32)) -> DynamicImage {
    let mut canvas = RgbImage::from_pixel(target_w, target_h, Rgb([0, 0, 0]));
    let (src_w, src_h) = frame.dimensions();
    if src_w == 0 || src_h == 0 || target_w == 0 || target_h == 0 {
        return DynamicImage::ImageRgb8(canvas);
    }

    let scale = f64::min(
        f64::from(target_w) / f64::from(src_w),
        f64::from(target_h) / f64::from(src_h),
    );
    let new_w = ((f64::from(src_w) * scale).round() as u32).clamp(1, target_w);
    let new_h = ((f64::from(src_h) * scale).round() as u32).clamp(1, target_h);

    let resized = imageops::resize(&frame.to_rgb8(), new_w, new_h, FilterType::Triangle);
    let x = i64::from((target_w - new_w) / 2);
    let y = i64::from((target_h - new_h) / 2);
    imageops::overlay(&mut canvas, &resized, x, y);

    DynamicImage::ImageRgb8(canvas)
}

/// Keep `target` evenly spaced items, first and last included.
///
/// A single-item target keeps only the first item; a target at or above the
/// input length returns the input unchanged.
pub fn downsample_frames<T>(frames: Vec<T>, target: usize) -> Vec<T> {
    if target == 0 {
        return Vec::new();
    }
    if frames.len() <= target {
        return frames;
    }
    if target == 1 {
        return frames.into_iter().take(1).collect();
    }

    let indices = downsample_indices(frames.len(), target);
    let mut wanted = indices.iter().peekable();
    frames
        .into_iter()
        .enumerate()
        .filter_map(|(idx, frame)| {
            if wanted.peek() == Some(&&idx) {
                wanted.next();
                Some(frame)
            } else {
                None
            }
        })
        .collect()
}

/// `i * (len - 1) / (target - 1)` for `i in 0..target`, strictly increasing for `target <= len`.
fn downsample_indices(len: usize, target: usize) -> Vec<usize> {
    let last = len - 1;
    (0..target).map(|i| i * last / (target - 1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbaImage};

    fn rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 10, 10])))
    }

    #[test]
    fn uniform_frames_are_untouched() {
        let frames = vec![rgb(64, 32), rgb(64, 32), rgb(64, 32)];
        let out = normalize_frame_sizes(frames).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|f| f.dimensions() == (64, 32)));
    }

    #[test]
    fn majority_size_wins() {
        let frames = vec![rgb(64, 32), rgb(32, 32), rgb(64, 32)];
        let out = normalize_frame_sizes(frames).unwrap();
        assert!(out.iter().all(|f| f.dimensions() == (64, 32)));
        assert!(out.iter().all(|f| matches!(f, DynamicImage::ImageRgb8(_))));
    }

    #[test]
    fn tie_goes_to_larger_area() {
        assert_eq!(canonical_size(&[(10, 10), (20, 20)]), Some((20, 20)));
        assert_eq!(canonical_size(&[(20, 20), (10, 10)]), Some((20, 20)));
    }

    #[test]
    fn full_tie_goes_to_first_seen() {
        assert_eq!(canonical_size(&[(10, 20), (20, 10)]), Some((10, 20)));
    }

    #[test]
    fn empty_sizes_have_no_canonical() {
        assert_eq!(canonical_size(&[]), None);
        assert!(normalize_frame_sizes(Vec::new()).is_none());
    }

    #[test]
    fn letterbox_pads_with_black_and_keeps_content_centered() {
        // A wide 40x10 frame into a 20x20 target: scaled to 20x5, centred vertically.
        let frames = vec![rgb(20, 20), rgb(20, 20), rgb(40, 10)];
        let out = normalize_frame_sizes(frames).unwrap();
        let padded = out[2].to_rgb8();
        assert_eq!(padded.dimensions(), (20, 20));
        assert_eq!(*padded.get_pixel(10, 0), Rgb([0, 0, 0]));
        assert_eq!(*padded.get_pixel(10, 19), Rgb([0, 0, 0]));
        assert_ne!(*padded.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn mixed_color_modes_become_rgb() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([128])));
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 3, 4])));
        let frames = vec![gray, rgba, rgb(4, 4)];
        let out = normalize_frame_sizes(frames).unwrap();
        assert_eq!(out.len(), 3);
        for frame in &out {
            assert_eq!(frame.dimensions(), (8, 8));
            assert!(matches!(frame, DynamicImage::ImageRgb8(_)));
        }
    }

    #[tokio::test]
    async fn blocking_variant_matches_inline() {
        let frames = vec![rgb(20, 20), rgb(40, 10), rgb(20, 20)];
        let out = normalize_frame_sizes_blocking(frames).await.unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|f| f.dimensions() == (20, 20)));
        assert!(normalize_frame_sizes_blocking(Vec::new()).await.is_none());
    }

    #[test]
    fn downsample_to_one_keeps_first() {
        assert_eq!(downsample_frames(vec![1, 2, 3, 4, 5], 1), vec![1]);
    }

    #[test]
    fn downsample_keeps_first_and_last() {
        let frames: Vec<usize> = (0..64).collect();
        let out = downsample_frames(frames, 22);
        assert_eq!(out.len(), 22);
        assert_eq!(out[0], 0);
        assert_eq!(*out.last().unwrap(), 63);
        assert!(out.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn downsample_evenly_spaced() {
        let frames: Vec<usize> = (0..10).collect();
        assert_eq!(downsample_frames(frames, 4), vec![0, 3, 6, 9]);
    }

    #[test]
    fn downsample_noop_when_short_enough() {
        assert_eq!(downsample_frames(vec![1, 2, 3], 3), vec![1, 2, 3]);
        assert_eq!(downsample_frames(vec![1, 2], 8), vec![1, 2]);
    }

    #[test]
    fn downsample_to_zero_is_empty() {
        assert!(downsample_frames(vec![1, 2, 3], 0).is_empty());
    }

    #[test]
    fn downsample_every_target_is_exact() {
        for len in 1..40usize {
            for target in 1..=len {
                let out = downsample_frames((0..len).collect::<Vec<_>>(), target);
                assert_eq!(out.len(), target, "len={len} target={target}");
                assert_eq!(out[0], 0);
                if target > 1 {
                    assert_eq!(*out.last().unwrap(), len - 1);
                }
            }
        }
    }
}

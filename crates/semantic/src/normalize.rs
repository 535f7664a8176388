/// In-place L2 normalization. Zero vectors are left untouched.
pub fn l2_normalize_in_place(v: &mut [f32]) {
    let norm_sq: f32 = v.iter().map(|x| x * x).sum();
    if norm_sq > 0.0 {
        let inv_norm = norm_sq.sqrt().recip();
        for x in v.iter_mut() {
            *x *= inv_norm;
        }
    }
}

/// Truncate to `dims` when that is shorter than the native length, then
/// re-normalize. Otherwise the vector passes through as produced.
pub fn fit_dims(mut v: Vec<f32>, dims: usize) -> Vec<f32> {
    if dims > 0 && dims < v.len() {
        v.truncate(dims);
        l2_normalize_in_place(&mut v);
    }
    v
}

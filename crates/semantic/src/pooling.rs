use crate::{ModelError, ModelErrorKind, ModelOutput};

/// Hidden state at the last non-padding position of each sequence.
///
/// A row whose mask is all zeros pools its final position.
pub fn pool_last(output: &ModelOutput) -> Result<Vec<Vec<f32>>, ModelError> {
    if output.last_hidden_state.len() != output.attention_mask.len() {
        return Err(malformed(format!(
            "batch size mismatch: hidden={} mask={}",
            output.last_hidden_state.len(),
            output.attention_mask.len()
        )));
    }

    output
        .last_hidden_state
        .iter()
        .zip(&output.attention_mask)
        .enumerate()
        .map(|(row, (hidden, mask))| {
            if hidden.is_empty() || hidden.len() != mask.len() {
                return Err(malformed(format!(
                    "row {row}: {} hidden positions for {} mask positions",
                    hidden.len(),
                    mask.len()
                )));
            }
            let col = mask
                .iter()
                .rposition(|m| *m != 0)
                .unwrap_or(mask.len() - 1);
            Ok(hidden[col].clone())
        })
        .collect()
}

fn malformed(detail: String) -> ModelError {
    ModelError::new(ModelErrorKind::Other, format!("malformed model output: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(mask: Vec<Vec<i64>>) -> ModelOutput {
        let last_hidden_state = mask
            .iter()
            .map(|row| (0..row.len()).map(|i| vec![i as f32, 1.0]).collect())
            .collect();
        ModelOutput {
            last_hidden_state,
            attention_mask: mask,
        }
    }

    #[test]
    fn picks_last_unmasked_position() {
        let pooled = pool_last(&output(vec![vec![1, 1, 1, 0, 0], vec![1, 1, 1, 1, 1]])).unwrap();
        assert_eq!(pooled[0], vec![2.0, 1.0]);
        assert_eq!(pooled[1], vec![4.0, 1.0]);
    }

    #[test]
    fn left_padding_is_handled() {
        let pooled = pool_last(&output(vec![vec![0, 0, 1, 1]])).unwrap();
        assert_eq!(pooled[0], vec![3.0, 1.0]);
    }

    #[test]
    fn all_zero_mask_pools_final_position() {
        let pooled = pool_last(&output(vec![vec![0, 0, 0]])).unwrap();
        assert_eq!(pooled[0], vec![2.0, 1.0]);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let mut out = output(vec![vec![1, 1]]);
        out.attention_mask.push(vec![1]);
        assert!(pool_last(&out).is_err());
    }
}

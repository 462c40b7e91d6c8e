//! HTF→LTF time alignment.
//!
//! Each LTF bar sees the feature record of the most recent HTF bar that had
//! already *closed* when the LTF bar opened (`htf.close_time <= ltf.open_time`,
//! strict inequality on "more recent"). No fixed HTF:LTF ratio is assumed —
//! only monotone ordering of both streams. LTF bars that predate the first
//! closed HTF bar get an all-undefined record.

use crate::domain::Bar;
use thiserror::Error;

use super::HtfFeatures;

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("HTF bars ({bars}) and HTF features ({features}) have different lengths")]
    LengthMismatch { bars: usize, features: usize },
}

/// Produce one aligned HTF feature record per LTF bar.
///
/// Stable under re-invocation: the output depends only on the inputs.
pub fn align_htf_to_ltf(
    ltf_bars: &[Bar],
    htf_bars: &[Bar],
    htf_features: &[HtfFeatures],
) -> Result<Vec<HtfFeatures>, AlignmentError> {
    if htf_bars.len() != htf_features.len() {
        return Err(AlignmentError::LengthMismatch {
            bars: htf_bars.len(),
            features: htf_features.len(),
        });
    }

    let mut aligned = Vec::with_capacity(ltf_bars.len());
    let mut htf_idx: Option<usize> = None;
    let mut next = 0usize;

    for ltf in ltf_bars {
        while next < htf_bars.len() && htf_bars[next].close_time <= ltf.open_time {
            htf_idx = Some(next);
            next += 1;
        }
        aligned.push(match htf_idx {
            Some(i) => htf_features[i].clone(),
            None => HtfFeatures::undefined(),
        });
    }

    Ok(aligned)
}

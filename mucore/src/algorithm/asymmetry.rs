use itertools::izip;
use log::warn;
use statrs::statistics::Statistics;

use crate::data::spectrum::{Spectrum, YUnit};
use crate::error::{Error, Result};

/// Muon lifetime in microseconds, the decay envelope of the raw counts.
pub const MUON_LIFETIME_MICROSECONDS: f64 = 2.197019;

/// Output of the counts-to-asymmetry estimation.
pub struct AsymmetryEstimate {
    /// Decay-removed, normalized asymmetry, tagged `YUnit::Asymmetry`.
    pub asymmetry: Spectrum,
    /// The normalization constant that was estimated or passed through.
    pub normalization: f64,
    /// Counts after good-frames normalization, before the asymmetry
    /// transform. Still tagged `YUnit::Counts`.
    pub unnormalized: Spectrum,
}

/// Converts a counts spectrum into a normalized asymmetry spectrum.
///
/// Counts are first divided by the good-frames count (zero or absent
/// frame counts fall back to 1.0 with a warning). When `fixed_norm` is
/// zero a normalization constant is estimated as the window average of the
/// decay-corrected counts over `[start_x, end_x]`; otherwise `fixed_norm`
/// is used as is. The asymmetry is the counts divided by the fitted decay
/// envelope, minus one.
pub fn estimate_asymmetry(
    spectrum: &Spectrum,
    good_frames: Option<f64>,
    start_x: f64,
    end_x: f64,
    fixed_norm: f64,
) -> Result<AsymmetryEstimate> {
    if start_x >= end_x {
        return Err(Error::Validation(format!(
            "the estimation window must satisfy start < end, got {}..{}",
            start_x, end_x
        )));
    }
    if fixed_norm < 0.0 {
        return Err(Error::Validation(format!(
            "the normalization constant must be zero (estimate) or positive, got {}",
            fixed_norm
        )));
    }

    let frames = match good_frames {
        Some(frames) if frames > 0.0 => frames,
        _ => {
            warn!("no usable good-frames count, substituting 1.0");
            1.0
        }
    };
    let unnormalized = spectrum.scaled(1.0 / frames);

    let centres = spectrum.bin_centres();
    let normalization = if fixed_norm == 0.0 {
        estimate_normalization(&unnormalized, &centres, start_x, end_x)?
    } else {
        fixed_norm
    };

    let mut y = Vec::with_capacity(unnormalized.y.len());
    let mut e = Vec::with_capacity(unnormalized.e.len());
    for (&t, &counts, &error) in izip!(&centres, &unnormalized.y, &unnormalized.e) {
        let envelope = normalization * (-t / MUON_LIFETIME_MICROSECONDS).exp();
        y.push(counts / envelope - 1.0);
        e.push(error / envelope);
    }

    let asymmetry = Spectrum {
        x: spectrum.x.clone(),
        y,
        e,
        detectors: spectrum.detectors.clone(),
        y_unit: YUnit::Asymmetry,
    };
    Ok(AsymmetryEstimate { asymmetry, normalization, unnormalized })
}

/// Window average of the decay-corrected counts, i.e. the amplitude of the
/// decay envelope over `[start_x, end_x]`.
fn estimate_normalization(
    counts: &Spectrum,
    centres: &[f64],
    start_x: f64,
    end_x: f64,
) -> Result<f64> {
    let corrected: Vec<f64> = centres
        .iter()
        .zip(counts.y.iter())
        .filter(|&(&t, _)| start_x <= t && t <= end_x)
        .map(|(&t, &y)| y * (t / MUON_LIFETIME_MICROSECONDS).exp())
        .collect();

    if corrected.is_empty() {
        return Err(Error::Validation(format!(
            "the estimation window {}..{} covers no bins",
            start_x, end_x
        )));
    }
    let normalization = corrected.iter().mean();
    if normalization <= 0.0 {
        return Err(Error::Validation(format!(
            "estimated a non-positive normalization ({}) over {}..{}",
            normalization, start_x, end_x
        )));
    }
    Ok(normalization)
}

/// Pairwise asymmetry `A = (F - alpha * B) / (F + alpha * B)` per bin,
/// with first-order error propagation through the ratio. Bins with a zero
/// denominator yield zero asymmetry and zero error.
pub fn pair_asymmetry(forward: &Spectrum, backward: &Spectrum, alpha: f64) -> Result<Spectrum> {
    if alpha <= 0.0 {
        return Err(Error::Validation(format!(
            "the balance factor alpha must be positive, got {}",
            alpha
        )));
    }
    if !forward.same_binning(backward) {
        return Err(Error::IncompatibleShape(
            "the paired spectra have different x axes".to_string(),
        ));
    }

    let mut y = Vec::with_capacity(forward.y.len());
    let mut e = Vec::with_capacity(forward.e.len());
    for (&f, &ef, &b, &eb) in izip!(&forward.y, &forward.e, &backward.y, &backward.e) {
        let denominator = f + alpha * b;
        if denominator == 0.0 {
            y.push(0.0);
            e.push(0.0);
        } else {
            y.push((f - alpha * b) / denominator);
            let df = 2.0 * alpha * b * ef;
            let db = 2.0 * alpha * f * eb;
            e.push((df * df + db * db).sqrt() / (denominator * denominator));
        }
    }

    Ok(Spectrum {
        x: forward.x.clone(),
        y,
        e,
        detectors: forward.detectors.union(&backward.detectors).copied().collect(),
        y_unit: YUnit::Asymmetry,
    })
}

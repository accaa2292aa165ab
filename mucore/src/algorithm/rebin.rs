use rayon::prelude::*;

use crate::data::dataset::MuonDataset;
use crate::data::spectrum::Spectrum;
use crate::error::{Error, Result};

/// Builds new bin edges from a rebin parameter list.
///
/// The list is `[x0, dx0, x1, dx1, ..., xn]`: boundaries with a step width
/// per segment. A negative width makes the segment logarithmic
/// (`x * (1 + |dx|)` per step). A single value is shorthand for that width
/// across the current extent `[x_min, x_max]`. With `keep_partial` a
/// trailing under-width bin up to the last boundary is emitted instead of
/// being dropped, so the full requested range stays covered.
pub fn rebin_edges(params: &[f64], x_min: f64, x_max: f64, keep_partial: bool) -> Result<Vec<f64>> {
    let params: Vec<f64> = match params.len() {
        0 => return Err(Error::Validation("rebin parameters must not be empty".to_string())),
        1 => vec![x_min, params[0], x_max],
        n if n % 2 == 1 => params.to_vec(),
        n => {
            return Err(Error::Validation(format!(
                "rebin parameters need an odd length (boundary, width, ..., boundary), got {}",
                n
            )))
        }
    };

    let mut edges = vec![params[0]];
    let mut start = params[0];
    for segment in params[1..].chunks(2) {
        let (width, bound) = (segment[0], segment[1]);
        if width == 0.0 {
            return Err(Error::Validation("rebin widths must not be zero".to_string()));
        }
        if bound <= start {
            return Err(Error::Validation(format!(
                "rebin boundaries must increase, got {} after {}",
                bound, start
            )));
        }
        if width < 0.0 && start <= 0.0 {
            return Err(Error::Validation(
                "logarithmic rebin segments need a positive lower boundary".to_string(),
            ));
        }

        let mut edge = start;
        loop {
            let next = if width > 0.0 { edge + width } else { edge * (1.0 - width) };
            if next >= bound {
                // the remainder is an under-width bin
                if keep_partial && bound > edge {
                    edges.push(bound);
                }
                break;
            }
            edges.push(next);
            edge = next;
        }
        // the next segment starts at this segment's boundary
        start = bound;
    }

    if edges.len() < 2 {
        return Err(Error::Validation("rebin parameters produce no bins".to_string()));
    }
    Ok(edges)
}

/// Redistributes histogram counts onto new bin edges.
///
/// Counts are split by fractional overlap of old and new bins; the output
/// error is `sqrt(sum_i f_i * e_i^2)`, so total integrated counts are
/// conserved when the new edges cover the old range.
pub fn rebin_spectrum(spectrum: &Spectrum, params: &[f64], keep_partial: bool) -> Result<Spectrum> {
    if !spectrum.is_histogram() {
        return Err(Error::Validation("rebinning needs bin-edge data".to_string()));
    }

    let edges = rebin_edges(params, spectrum.x_min(), spectrum.x_max(), keep_partial)?;
    let bins = edges.len() - 1;
    let mut y = vec![0.0; bins];
    let mut e2 = vec![0.0; bins];

    let mut j = 0usize;
    for i in 0..spectrum.y.len() {
        let (lo, hi) = (spectrum.x[i], spectrum.x[i + 1]);
        let width = hi - lo;
        if width <= 0.0 {
            continue;
        }
        while j + 1 < edges.len() && edges[j + 1] <= lo {
            j += 1;
        }
        let mut k = j;
        while k < bins && edges[k] < hi {
            let overlap = edges[k + 1].min(hi) - edges[k].max(lo);
            if overlap > 0.0 {
                let fraction = overlap / width;
                y[k] += spectrum.y[i] * fraction;
                e2[k] += spectrum.e[i] * spectrum.e[i] * fraction;
            }
            k += 1;
        }
    }

    Ok(Spectrum {
        x: edges,
        y,
        e: e2.iter().map(|e2| e2.sqrt()).collect(),
        detectors: spectrum.detectors.clone(),
        y_unit: spectrum.y_unit,
    })
}

/// Crops a spectrum to `[x_min, x_max]`; unset bounds mean the spectrum
/// extent. Histogram bins containing a bound are kept whole.
pub fn crop_spectrum(spectrum: &Spectrum, x_min: Option<f64>, x_max: Option<f64>) -> Result<Spectrum> {
    let lo = x_min.unwrap_or_else(|| spectrum.x_min());
    let hi = x_max.unwrap_or_else(|| spectrum.x_max());
    if lo >= hi {
        return Err(Error::Validation(format!("crop window {}..{} is empty", lo, hi)));
    }

    if spectrum.is_histogram() {
        let bins = spectrum.y.len();
        let first = (0..bins).find(|&i| spectrum.x[i + 1] > lo);
        let last = (0..bins).rev().find(|&i| spectrum.x[i] < hi);
        let (first, last) = match (first, last) {
            (Some(first), Some(last)) if first <= last => (first, last),
            _ => {
                return Err(Error::Validation(format!(
                    "crop window {}..{} leaves no bins",
                    lo, hi
                )))
            }
        };
        return Ok(Spectrum {
            x: spectrum.x[first..=last + 1].to_vec(),
            y: spectrum.y[first..=last].to_vec(),
            e: spectrum.e[first..=last].to_vec(),
            detectors: spectrum.detectors.clone(),
            y_unit: spectrum.y_unit,
        });
    }

    let kept: Vec<usize> =
        (0..spectrum.x.len()).filter(|&i| spectrum.x[i] >= lo && spectrum.x[i] <= hi).collect();
    if kept.is_empty() {
        return Err(Error::Validation(format!("crop window {}..{} leaves no points", lo, hi)));
    }
    Ok(Spectrum {
        x: kept.iter().map(|&i| spectrum.x[i]).collect(),
        y: kept.iter().map(|&i| spectrum.y[i]).collect(),
        e: kept.iter().map(|&i| spectrum.e[i]).collect(),
        detectors: spectrum.detectors.clone(),
        y_unit: spectrum.y_unit,
    })
}

/// Applies one bound pair to every spectrum of a dataset.
pub fn crop_dataset(data: &MuonDataset, x_min: Option<f64>, x_max: Option<f64>) -> Result<MuonDataset> {
    let spectra = data
        .spectra
        .par_iter()
        .map(|s| crop_spectrum(s, x_min, x_max))
        .collect::<Result<Vec<_>>>()?;
    Ok(MuonDataset::new(data.meta.clone(), spectra))
}

/// Crops with one bound pair per spectrum; spectra may end up with
/// divergent X ranges.
pub fn crop_dataset_ragged(
    data: &MuonDataset,
    x_min: &[Option<f64>],
    x_max: &[Option<f64>],
) -> Result<MuonDataset> {
    if x_min.len() != data.spectrum_count() || x_max.len() != data.spectrum_count() {
        return Err(Error::Validation(format!(
            "ragged crop needs one bound pair per spectrum, got {}/{} for {} spectra",
            x_min.len(),
            x_max.len(),
            data.spectrum_count()
        )));
    }
    let spectra = data
        .spectra
        .par_iter()
        .zip(x_min.par_iter().zip(x_max.par_iter()))
        .map(|(s, (lo, hi))| crop_spectrum(s, *lo, *hi))
        .collect::<Result<Vec<_>>>()?;
    Ok(MuonDataset::new(data.meta.clone(), spectra))
}

/// Rebins every spectrum of a dataset onto the parameterized edges.
pub fn rebin_dataset(data: &MuonDataset, params: &[f64], keep_partial: bool) -> Result<MuonDataset> {
    let spectra = data
        .spectra
        .par_iter()
        .map(|s| rebin_spectrum(s, params, keep_partial))
        .collect::<Result<Vec<_>>>()?;
    Ok(MuonDataset::new(data.meta.clone(), spectra))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn counts(y: Vec<f64>) -> Spectrum {
        let x = (0..=y.len()).map(|i| i as f64).collect();
        let e = y.iter().map(|y| y.sqrt()).collect();
        Spectrum::new(x, y, e, BTreeSet::from([1]))
    }

    #[test]
    fn rebin_merges_pairs_of_bins() {
        let s = counts(vec![1.0, 2.0, 3.0, 4.0]);

        let rebinned = rebin_spectrum(&s, &[2.0], true).unwrap();

        assert_eq!(rebinned.x, vec![0.0, 2.0, 4.0]);
        assert_eq!(rebinned.y, vec![3.0, 7.0]);
    }

    #[test]
    fn partial_trailing_bin_conserves_counts() {
        let s = counts(vec![1.0, 2.0, 3.0, 4.0, 5.0]);

        let rebinned = rebin_spectrum(&s, &[2.0], true).unwrap();

        // last bin spans 4..5 only, half a step wide
        assert_eq!(rebinned.x, vec![0.0, 2.0, 4.0, 5.0]);
        let total: f64 = rebinned.y.iter().sum();
        assert!((total - 15.0).abs() < 1e-12);
    }

    #[test]
    fn dropping_the_partial_bin_loses_the_tail() {
        let s = counts(vec![1.0, 2.0, 3.0, 4.0, 5.0]);

        let rebinned = rebin_spectrum(&s, &[2.0], false).unwrap();

        assert_eq!(rebinned.x, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn rebin_error_is_quadrature_weighted() {
        let s = Spectrum::new(
            vec![0.0, 1.0, 2.0],
            vec![4.0, 9.0],
            vec![2.0, 3.0],
            BTreeSet::from([1]),
        );

        let rebinned = rebin_spectrum(&s, &[2.0], true).unwrap();

        assert_eq!(rebinned.y, vec![13.0]);
        assert!((rebinned.e[0] - 13.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn even_length_parameter_lists_are_rejected() {
        let s = counts(vec![1.0, 2.0]);

        let result = rebin_spectrum(&s, &[0.0, 1.0], true);

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn crop_keeps_bins_containing_the_bounds() {
        let s = counts(vec![1.0, 2.0, 3.0, 4.0]);

        let cropped = crop_spectrum(&s, Some(1.5), Some(2.5)).unwrap();

        assert_eq!(cropped.x, vec![1.0, 2.0, 3.0]);
        assert_eq!(cropped.y, vec![2.0, 3.0]);
    }

    #[test]
    fn unset_bounds_keep_the_extent() {
        let s = counts(vec![1.0, 2.0]);

        let cropped = crop_spectrum(&s, None, None).unwrap();

        assert_eq!(cropped, s);
    }

    #[test]
    fn ragged_crop_applies_per_spectrum_bounds() {
        let data = MuonDataset::new(
            crate::data::dataset::RunMeta::new("EMU", 1),
            vec![counts(vec![1.0, 2.0, 3.0]), counts(vec![4.0, 5.0, 6.0])],
        );

        let cropped =
            crop_dataset_ragged(&data, &[Some(0.0), Some(1.0)], &[Some(2.0), Some(3.0)]).unwrap();

        assert_eq!(cropped.spectra[0].y, vec![1.0, 2.0]);
        assert_eq!(cropped.spectra[1].y, vec![5.0, 6.0]);
    }

    #[test]
    fn logarithmic_segments_grow_geometrically() {
        let edges = rebin_edges(&[1.0, -1.0, 8.0], 0.0, 0.0, true).unwrap();

        assert_eq!(edges, vec![1.0, 2.0, 4.0, 8.0]);
    }
}

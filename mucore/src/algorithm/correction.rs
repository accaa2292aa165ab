use itertools::izip;
use serde::{Deserialize, Serialize};

use crate::algorithm::rebin::{crop_dataset, crop_dataset_ragged, rebin_dataset};
use crate::data::dataset::MuonDataset;
use crate::data::spectrum::Spectrum;
use crate::error::{Error, Result};

/// Time axis correction. The two forms are mutually exclusive: a table
/// carries one time-zero row per spectrum and is subtracted per spectrum,
/// a scalar offset is added to every spectrum identically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TimeShift {
    Table(Vec<f64>),
    Offset(f64),
}

/// Per-period corrections, applied in a fixed order: dead-time, time
/// shift, crop, rebin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// One dead-time coefficient per channel, at most one per spectrum;
    /// spectra beyond the table stay uncorrected.
    pub dead_times: Option<Vec<f64>>,
    pub time_shift: Option<TimeShift>,
    /// Crop bounds in microseconds; an unset bound means the data extent.
    pub crop_min: Option<f64>,
    pub crop_max: Option<f64>,
    /// Rebin parameter list; empty means no rebinning.
    pub rebin_params: Vec<f64>,
}

impl CorrectionConfig {
    /// True when no correction is configured at all.
    pub fn is_empty(&self) -> bool {
        self.dead_times.is_none()
            && self.time_shift.is_none()
            && self.crop_min.is_none()
            && self.crop_max.is_none()
            && self.rebin_params.is_empty()
    }

    /// Checks the correction tables against a dataset before any numeric
    /// work is done.
    pub fn validate(&self, data: &MuonDataset) -> Result<()> {
        if let Some(dead_times) = &self.dead_times {
            if dead_times.len() > data.spectrum_count() {
                return Err(Error::Validation(format!(
                    "dead-time table has {} rows but the data has {} spectra",
                    dead_times.len(),
                    data.spectrum_count()
                )));
            }
        }
        if let Some(TimeShift::Table(time_zeros)) = &self.time_shift {
            if time_zeros.len() > data.spectrum_count() {
                return Err(Error::Validation(format!(
                    "time-zero table has {} rows but the data has {} spectra",
                    time_zeros.len(),
                    data.spectrum_count()
                )));
            }
        }
        Ok(())
    }
}

/// Applies the configured corrections to one period of counts data.
///
/// With an all-empty configuration the result is a deep, independent copy
/// of the input, never an alias. When a time-zero table was supplied the
/// crop runs on per-spectrum bounds (the spectra may have diverged), with
/// a scalar offset or no shift a single bound pair is applied to all
/// spectra.
pub fn correct(data: &MuonDataset, config: &CorrectionConfig) -> Result<MuonDataset> {
    config.validate(data)?;
    if config.is_empty() {
        return Ok(data.clone());
    }

    let mut out = data.clone();

    if let Some(dead_times) = &config.dead_times {
        out = apply_dead_time(&out, dead_times);
    }

    match &config.time_shift {
        Some(TimeShift::Table(time_zeros)) => {
            for (spectrum, time_zero) in out.spectra.iter_mut().zip(time_zeros.iter()) {
                *spectrum = spectrum.shifted(-time_zero);
            }
        }
        Some(TimeShift::Offset(offset)) => {
            for spectrum in out.spectra.iter_mut() {
                *spectrum = spectrum.shifted(*offset);
            }
        }
        None => {}
    }

    if config.crop_min.is_some() || config.crop_max.is_some() {
        out = match &config.time_shift {
            Some(TimeShift::Table(_)) => {
                let mins = vec![config.crop_min; out.spectrum_count()];
                let maxs = vec![config.crop_max; out.spectrum_count()];
                crop_dataset_ragged(&out, &mins, &maxs)?
            }
            _ => crop_dataset(&out, config.crop_min, config.crop_max)?,
        };
    }

    if !config.rebin_params.is_empty() {
        out = rebin_dataset(&out, &config.rebin_params, true)?;
    }

    Ok(out)
}

/// Count-rate dead-time correction, `y' = y / (1 - y * tau / (w * F))`
/// with `w` the bin width and `F` the good-frames count. E is scaled by
/// the first-order derivative of the correction. Bins whose correction
/// denominator is not positive are left as measured.
fn apply_dead_time(data: &MuonDataset, dead_times: &[f64]) -> MuonDataset {
    let frames = data.meta.effective_good_frames();
    let spectra = data
        .spectra
        .iter()
        .enumerate()
        .map(|(position, spectrum)| match dead_times.get(position) {
            Some(&tau) => correct_spectrum_rate(spectrum, tau, frames),
            None => spectrum.clone(),
        })
        .collect();
    MuonDataset::new(data.meta.clone(), spectra)
}

fn correct_spectrum_rate(spectrum: &Spectrum, tau: f64, frames: f64) -> Spectrum {
    let widths = spectrum.bin_widths();
    let mut y = Vec::with_capacity(spectrum.y.len());
    let mut e = Vec::with_capacity(spectrum.e.len());
    for (&width, &counts, &error) in izip!(&widths, &spectrum.y, &spectrum.e) {
        let denominator = 1.0 - counts * tau / (width * frames);
        if denominator > 0.0 {
            y.push(counts / denominator);
            e.push(error / (denominator * denominator));
        } else {
            y.push(counts);
            e.push(error);
        }
    }
    Spectrum {
        x: spectrum.x.clone(),
        y,
        e,
        detectors: spectrum.detectors.clone(),
        y_unit: spectrum.y_unit,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::dataset::RunMeta;

    fn dataset() -> MuonDataset {
        let spectra = (1..=2)
            .map(|id| {
                Spectrum::new(
                    vec![0.0, 1.0, 2.0, 3.0],
                    vec![10.0, 20.0, 30.0],
                    vec![2.0, 3.0, 4.0],
                    BTreeSet::from([id]),
                )
            })
            .collect();
        let mut meta = RunMeta::new("EMU", 51341);
        meta.good_frames = Some(100.0);
        MuonDataset::new(meta, spectra)
    }

    #[test]
    fn empty_config_returns_an_equal_but_distinct_copy() {
        let data = dataset();

        let corrected = correct(&data, &CorrectionConfig::default()).unwrap();

        assert_eq!(corrected, data);
        assert!(!std::ptr::eq(
            corrected.spectra[0].y.as_ptr(),
            data.spectra[0].y.as_ptr()
        ));
    }

    #[test]
    fn oversized_dead_time_table_is_rejected() {
        let data = dataset();
        let config = CorrectionConfig {
            dead_times: Some(vec![0.1, 0.1, 0.1]),
            ..CorrectionConfig::default()
        };

        let result = correct(&data, &config);

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn oversized_time_zero_table_is_rejected() {
        let data = dataset();
        let config = CorrectionConfig {
            time_shift: Some(TimeShift::Table(vec![0.1, 0.2, 0.3])),
            ..CorrectionConfig::default()
        };

        let result = correct(&data, &config);

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn dead_time_correction_raises_counts() {
        let data = dataset();
        let config = CorrectionConfig {
            dead_times: Some(vec![1.0]),
            ..CorrectionConfig::default()
        };

        let corrected = correct(&data, &config).unwrap();

        // spectrum 0 corrected: 10 / (1 - 10 * 1 / (1 * 100)) = 100/9
        assert!((corrected.spectra[0].y[0] - 100.0 / 9.0).abs() < 1e-12);
        // spectrum 1 is beyond the one-row table and stays as measured
        assert_eq!(corrected.spectra[1].y, data.spectra[1].y);
    }

    #[test]
    fn time_zero_table_shifts_each_spectrum_by_its_own_row() {
        let data = dataset();
        let config = CorrectionConfig {
            time_shift: Some(TimeShift::Table(vec![0.5, 1.0])),
            ..CorrectionConfig::default()
        };

        let corrected = correct(&data, &config).unwrap();

        assert_eq!(corrected.spectra[0].x, vec![-0.5, 0.5, 1.5, 2.5]);
        assert_eq!(corrected.spectra[1].x, vec![-1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn scalar_offset_shifts_all_spectra_identically() {
        let data = dataset();
        let config = CorrectionConfig {
            time_shift: Some(TimeShift::Offset(0.25)),
            ..CorrectionConfig::default()
        };

        let corrected = correct(&data, &config).unwrap();

        for spectrum in &corrected.spectra {
            assert_eq!(spectrum.x, vec![0.25, 1.25, 2.25, 3.25]);
        }
    }

    #[test]
    fn crop_and_rebin_run_after_the_shift() {
        let data = dataset();
        let config = CorrectionConfig {
            time_shift: Some(TimeShift::Offset(1.0)),
            crop_min: Some(2.0),
            crop_max: Some(4.0),
            rebin_params: vec![2.0],
            ..CorrectionConfig::default()
        };

        let corrected = correct(&data, &config).unwrap();

        // shifted edges 1..4, cropped to 2..4, rebinned into one 2-wide bin
        assert_eq!(corrected.spectra[0].x, vec![2.0, 4.0]);
        assert_eq!(corrected.spectra[0].y, vec![50.0]);
    }
}

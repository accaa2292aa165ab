use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::{Display, Formatter};

use bincode::{Decode, Encode};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::data::spectrum::Spectrum;
use crate::error::{Error, Result};

/// Metadata of the run a dataset was measured in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct RunMeta {
    pub instrument: String,
    pub run_number: u32,
    /// Last run of a co-added run range, if any.
    pub run_last: Option<u32>,
    /// Number of valid measurement frames, used for count normalization.
    pub good_frames: Option<f64>,
    /// Informational tags attached by pipeline stages.
    pub tags: BTreeMap<String, String>,
}

impl RunMeta {
    pub fn new(instrument: &str, run_number: u32) -> Self {
        RunMeta {
            instrument: instrument.to_string(),
            run_number,
            run_last: None,
            good_frames: None,
            tags: BTreeMap::new(),
        }
    }

    /// Generated run label, `<INSTRUMENT><zero-padded run>` or
    /// `<INSTRUMENT><first>-<last>` for a co-added range.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mucore::data::dataset::RunMeta;
    ///
    /// assert_eq!(RunMeta::new("MUSR", 15189).run_label(), "MUSR00015189");
    /// ```
    pub fn run_label(&self) -> String {
        match self.run_last {
            Some(last) => format!("{}{:08}-{:08}", self.instrument, self.run_number, last),
            None => format!("{}{:08}", self.instrument, self.run_number),
        }
    }

    /// Frame count used for normalization. Zero or absent counts fall back
    /// to 1.0 with a warning instead of dividing by zero.
    pub fn effective_good_frames(&self) -> f64 {
        match self.good_frames {
            Some(frames) if frames > 0.0 => frames,
            _ => {
                warn!("run {} carries no usable good-frames count, substituting 1.0", self.run_label());
                1.0
            }
        }
    }
}

/// An ordered collection of spectra from one period of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct MuonDataset {
    pub meta: RunMeta,
    pub spectra: Vec<Spectrum>,
}

impl MuonDataset {
    /// Constructs a new `MuonDataset`.
    ///
    /// # Arguments
    ///
    /// * `meta` - Run metadata.
    /// * `spectra` - One spectrum per recorded channel position.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeSet;
    /// use mucore::data::dataset::{MuonDataset, RunMeta};
    /// use mucore::data::spectrum::Spectrum;
    ///
    /// let spectrum = Spectrum::new(vec![0.0, 1.0], vec![5.0], vec![2.2], BTreeSet::from([1]));
    /// let dataset = MuonDataset::new(RunMeta::new("EMU", 51341), vec![spectrum]);
    /// assert_eq!(dataset.spectrum_count(), 1);
    /// ```
    pub fn new(meta: RunMeta, spectra: Vec<Spectrum>) -> Self {
        MuonDataset { meta, spectra }
    }

    pub fn spectrum_count(&self) -> usize {
        self.spectra.len()
    }

    /// Union of the detector identifiers owned by all spectra.
    pub fn detector_ids(&self) -> BTreeSet<usize> {
        self.spectra.iter().flat_map(|s| s.detectors.iter().copied()).collect()
    }

    /// The requested identifiers that no spectrum of this dataset owns.
    pub fn missing_detectors(&self, ids: &BTreeSet<usize>) -> BTreeSet<usize> {
        let present = self.detector_ids();
        ids.difference(&present).copied().collect()
    }

    /// Resolves detector identifiers to spectrum positions.
    ///
    /// Fails when the resolved position count differs from the requested
    /// identifier count, i.e. when an identifier is missing from the data,
    /// owned by more than one spectrum, or two identifiers share a spectrum.
    pub fn positions_of_detectors(&self, ids: &BTreeSet<usize>) -> Result<Vec<usize>> {
        let mut owners: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (position, spectrum) in self.spectra.iter().enumerate() {
            for &id in &spectrum.detectors {
                owners.entry(id).or_default().push(position);
            }
        }

        let mut positions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(found) = owners.get(id) {
                positions.extend_from_slice(found);
            }
        }

        let distinct: BTreeSet<usize> = positions.iter().copied().collect();
        if positions.len() != ids.len() || distinct.len() != positions.len() {
            return Err(Error::Validation(format!(
                "detectors not found: {} identifier(s) requested, {} spectrum position(s) resolved",
                ids.len(),
                distinct.len()
            )));
        }
        Ok(positions)
    }

    /// Elementwise sum over matching spectrum positions.
    pub fn checked_add(&self, other: &MuonDataset) -> Result<MuonDataset> {
        self.combined(other, Spectrum::checked_add)
    }

    /// Elementwise difference over matching spectrum positions.
    pub fn checked_sub(&self, other: &MuonDataset) -> Result<MuonDataset> {
        self.combined(other, Spectrum::checked_sub)
    }

    fn combined(
        &self,
        other: &MuonDataset,
        op: fn(&Spectrum, &Spectrum) -> Result<Spectrum>,
    ) -> Result<MuonDataset> {
        if self.spectrum_count() != other.spectrum_count() {
            return Err(Error::IncompatibleShape(format!(
                "cannot combine datasets with {} and {} spectra",
                self.spectrum_count(),
                other.spectrum_count()
            )));
        }
        let spectra = self
            .spectra
            .iter()
            .zip(other.spectra.iter())
            .map(|(a, b)| op(a, b))
            .collect::<Result<Vec<_>>>()?;
        Ok(MuonDataset { meta: self.meta.clone(), spectra })
    }
}

impl Display for MuonDataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MuonDataset({}, spectra: {}, detectors: {})",
            self.meta.run_label(),
            self.spectrum_count(),
            self.detector_ids().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_detector(id: usize, y: Vec<f64>) -> Spectrum {
        let x = (0..=y.len()).map(|i| i as f64).collect();
        let e = y.iter().map(|y| y.sqrt()).collect();
        Spectrum::new(x, y, e, BTreeSet::from([id]))
    }

    fn dataset(ids: &[usize]) -> MuonDataset {
        let spectra = ids.iter().map(|&id| single_detector(id, vec![1.0, 2.0])).collect();
        MuonDataset::new(RunMeta::new("EMU", 51341), spectra)
    }

    #[test]
    fn positions_follow_identifier_order() {
        let data = dataset(&[3, 1, 2]);

        let positions = data.positions_of_detectors(&BTreeSet::from([1, 3])).unwrap();

        assert_eq!(positions, vec![1, 0]);
    }

    #[test]
    fn missing_identifier_is_rejected() {
        let data = dataset(&[1, 2]);

        let result = data.positions_of_detectors(&BTreeSet::from([1, 7]));

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn identifiers_sharing_a_spectrum_are_rejected() {
        let mut data = dataset(&[1]);
        data.spectra[0].detectors = BTreeSet::from([1, 2]);

        let result = data.positions_of_detectors(&BTreeSet::from([1, 2]));

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn run_label_covers_co_added_ranges() {
        let mut meta = RunMeta::new("MUSR", 15189);
        meta.run_last = Some(15193);

        assert_eq!(meta.run_label(), "MUSR00015189-00015193");
    }

    #[test]
    fn effective_good_frames_substitutes_one_for_zero() {
        let mut meta = RunMeta::new("EMU", 1);
        meta.good_frames = Some(0.0);

        assert_eq!(meta.effective_good_frames(), 1.0);

        meta.good_frames = Some(2000.0);
        assert_eq!(meta.effective_good_frames(), 2000.0);
    }
}

use serde::{Deserialize, Serialize};

use crate::data::dataset::MuonDataset;
use crate::error::{Error, Result};

/// An ordered sequence of datasets, one per measurement period.
///
/// All periods share the same spectrum count and the same per-position
/// detector layout; the constructor enforces this. Period indices in the
/// public API are 1-based, matching how periods are counted on the
/// instrument.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeriodSet {
    periods: Vec<MuonDataset>,
}

impl PeriodSet {
    pub fn new(periods: Vec<MuonDataset>) -> Result<Self> {
        let first = periods
            .first()
            .ok_or_else(|| Error::Validation("a period set needs at least one period".to_string()))?;

        let count = first.spectrum_count();
        for (index, period) in periods.iter().enumerate().skip(1) {
            if period.spectrum_count() != count {
                return Err(Error::Validation(format!(
                    "period {} has {} spectra, period 1 has {}",
                    index + 1,
                    period.spectrum_count(),
                    count
                )));
            }
            for (position, (a, b)) in first.spectra.iter().zip(period.spectra.iter()).enumerate() {
                if a.detectors != b.detectors {
                    return Err(Error::Validation(format!(
                        "period {} owns different detectors than period 1 at spectrum {}",
                        index + 1,
                        position
                    )));
                }
            }
        }
        Ok(PeriodSet { periods })
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// The 1-based `period`-th dataset.
    pub fn get(&self, period: usize) -> Result<&MuonDataset> {
        if period == 0 || period > self.periods.len() {
            return Err(Error::PeriodIndex { index: period, count: self.periods.len() });
        }
        Ok(&self.periods[period - 1])
    }

    pub fn first(&self) -> &MuonDataset {
        &self.periods[0]
    }

    pub fn periods(&self) -> &[MuonDataset] {
        &self.periods
    }
}

/// Raw counts input of one pipeline invocation.
///
/// Loaders produce either one dataset or one dataset per period; the
/// pipeline always works on a `PeriodSet`, so a single dataset is wrapped
/// into a one-element set before processing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CountsInput {
    Single(MuonDataset),
    Periods(Vec<MuonDataset>),
}

impl CountsInput {
    /// Converts either variant into a validated `PeriodSet`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeSet;
    /// use mucore::data::dataset::{MuonDataset, RunMeta};
    /// use mucore::data::period::CountsInput;
    /// use mucore::data::spectrum::Spectrum;
    ///
    /// let spectrum = Spectrum::new(vec![0.0, 1.0], vec![5.0], vec![2.2], BTreeSet::from([1]));
    /// let dataset = MuonDataset::new(RunMeta::new("EMU", 51341), vec![spectrum]);
    /// let periods = CountsInput::Single(dataset).normalize().unwrap();
    /// assert_eq!(periods.len(), 1);
    /// ```
    pub fn normalize(self) -> Result<PeriodSet> {
        match self {
            CountsInput::Single(dataset) => PeriodSet::new(vec![dataset]),
            CountsInput::Periods(periods) => PeriodSet::new(periods),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::dataset::RunMeta;
    use crate::data::spectrum::Spectrum;

    fn period(ids: &[usize]) -> MuonDataset {
        let spectra = ids
            .iter()
            .map(|&id| {
                Spectrum::new(vec![0.0, 1.0, 2.0], vec![1.0, 2.0], vec![1.0, 1.4], BTreeSet::from([id]))
            })
            .collect();
        MuonDataset::new(RunMeta::new("EMU", 51341), spectra)
    }

    #[test]
    fn empty_period_lists_are_rejected() {
        let result = CountsInput::Periods(vec![]).normalize();

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn divergent_detector_layouts_are_rejected() {
        let result = PeriodSet::new(vec![period(&[1, 2]), period(&[1, 3])]);

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn period_access_is_one_based() {
        let set = PeriodSet::new(vec![period(&[1]), period(&[1])]).unwrap();

        assert!(set.get(1).is_ok());
        assert!(set.get(2).is_ok());
        assert_eq!(set.get(0), Err(Error::PeriodIndex { index: 0, count: 2 }));
        assert_eq!(set.get(3), Err(Error::PeriodIndex { index: 3, count: 2 }));
    }
}

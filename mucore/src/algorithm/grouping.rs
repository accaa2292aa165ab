use std::collections::BTreeSet;

use crate::data::dataset::MuonDataset;
use crate::error::{Error, Result};

/// Sums the spectra owned by a set of detector identifiers into one
/// combined spectrum.
///
/// The output dataset holds a single spectrum whose X axis comes from the
/// first resolved spectrum, whose Y is the elementwise sum, whose E is the
/// quadrature sum, and whose detector set is the union of the resolved
/// spectra. Grouping runs per period, before any period combination.
pub fn reduce_group(data: &MuonDataset, detectors: &BTreeSet<usize>) -> Result<MuonDataset> {
    if detectors.is_empty() {
        return Err(Error::Validation("a group needs at least one detector".to_string()));
    }

    let positions = data.positions_of_detectors(detectors)?;
    let mut combined = data.spectra[positions[0]].clone();
    for &position in &positions[1..] {
        combined = combined.checked_add(&data.spectra[position])?;
    }

    Ok(MuonDataset::new(data.meta.clone(), vec![combined]))
}

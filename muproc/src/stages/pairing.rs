use std::collections::BTreeSet;

use mucore::algorithm::asymmetry::pair_asymmetry;
use mucore::algorithm::combination::combine_periods;
use mucore::algorithm::grouping::reduce_group;
use mucore::algorithm::rebin::rebin_dataset;
use mucore::data::dataset::MuonDataset;
use mucore::data::period::PeriodSet;
use mucore::data::spectrum::Spectrum;
use mucore::error::{Error, Result};

use crate::options::AnalysisOptions;

/// How the two sides of a pair enter the stage.
pub enum PairInput<'a> {
    /// Reduce two detector groups from a common period set.
    Manual {
        periods: &'a PeriodSet,
        forward: BTreeSet<usize>,
        backward: BTreeSet<usize>,
    },
    /// Two already-reduced period sets, one spectrum per period each.
    PreReduced {
        forward: &'a PeriodSet,
        backward: &'a PeriodSet,
    },
}

/// Computes the balance-corrected asymmetry of one pair of opposite
/// groups.
///
/// The summed period list is counts-combined, concatenated and passed
/// through the pairwise asymmetry formula first; when a subtracted list is
/// present the same is done for it and the two asymmetry results are
/// subtracted elementwise. The subtraction always happens after the
/// asymmetry transform, never on counts across the two lists.
pub fn pair_and_analyze(
    input: PairInput<'_>,
    name: &str,
    alpha: f64,
    options: &AnalysisOptions,
) -> Result<MuonDataset> {
    if alpha <= 0.0 {
        return Err(Error::Validation(format!(
            "pair '{}' needs a positive balance factor, got {}",
            name, alpha
        )));
    }

    let (forward, backward) = resolve_sides(input, name)?;
    options.validate(forward.len())?;

    let paired: Vec<MuonDataset> = forward
        .periods()
        .iter()
        .zip(backward.periods().iter())
        .map(|(f, b)| concatenate(f, b))
        .collect::<Result<Vec<_>>>()?;
    let paired = PeriodSet::new(paired)?;

    let asymmetry_of = |list: &[usize]| -> Result<Spectrum> {
        let combined = combine_periods(&paired, list, &[])?;
        let combined = if options.rebin_params.is_empty() {
            combined
        } else {
            rebin_dataset(&combined, &options.rebin_params, true)?
        };
        pair_asymmetry(&combined.spectra[0], &combined.spectra[1], alpha)
    };

    let summed = asymmetry_of(&options.summed_periods)?;
    let spectrum = if options.subtracted_periods.is_empty() {
        summed
    } else {
        let subtracted = asymmetry_of(&options.subtracted_periods)?;
        summed.checked_sub(&subtracted)?
    };

    let mut meta = forward.first().meta.clone();
    meta.tags.insert("pair".to_string(), name.to_string());
    meta.tags.insert("alpha".to_string(), alpha.to_string());
    Ok(MuonDataset::new(meta, vec![spectrum]))
}

/// Brings both entry modes into the same shape: two period sets holding
/// one spectrum per period.
fn resolve_sides(input: PairInput<'_>, name: &str) -> Result<(PeriodSet, PeriodSet)> {
    match input {
        PairInput::Manual { periods, forward, backward } => {
            if forward == backward {
                return Err(Error::Validation(format!(
                    "the two groups of pair '{}' are identical",
                    name
                )));
            }
            let reduce = |ids: &BTreeSet<usize>| -> Result<PeriodSet> {
                let reduced = periods
                    .periods()
                    .iter()
                    .map(|period| reduce_group(period, ids))
                    .collect::<Result<Vec<_>>>()?;
                PeriodSet::new(reduced)
            };
            Ok((reduce(&forward)?, reduce(&backward)?))
        }
        PairInput::PreReduced { forward, backward } => {
            for side in [forward, backward] {
                for period in side.periods() {
                    if period.spectrum_count() != 1 {
                        return Err(Error::IncompatibleShape(format!(
                            "pair '{}' needs single-spectrum inputs, got {} spectra",
                            name,
                            period.spectrum_count()
                        )));
                    }
                }
            }
            if forward.len() != backward.len() {
                return Err(Error::IncompatibleShape(format!(
                    "the sides of pair '{}' have {} and {} periods",
                    name,
                    forward.len(),
                    backward.len()
                )));
            }
            Ok((forward.clone(), backward.clone()))
        }
    }
}

/// Places the two reduced spectra side by side: position 0 forward,
/// position 1 backward.
fn concatenate(forward: &MuonDataset, backward: &MuonDataset) -> Result<MuonDataset> {
    let f = forward.spectra.first().ok_or_else(|| {
        Error::IncompatibleShape("pairing needs a reduced forward spectrum".to_string())
    })?;
    let b = backward.spectra.first().ok_or_else(|| {
        Error::IncompatibleShape("pairing needs a reduced backward spectrum".to_string())
    })?;
    Ok(MuonDataset::new(forward.meta.clone(), vec![f.clone(), b.clone()]))
}

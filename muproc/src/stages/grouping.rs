use mucore::algorithm::asymmetry::estimate_asymmetry;
use mucore::algorithm::combination::combine_periods;
use mucore::algorithm::grouping::reduce_group;
use mucore::algorithm::rebin::rebin_dataset;
use mucore::data::dataset::MuonDataset;
use mucore::data::period::PeriodSet;
use mucore::error::{Error, Result};

use crate::options::{AnalysisKind, AnalysisOptions};
use crate::scheme::GroupDefinition;

/// Everything one grouped analysis produces.
#[derive(Clone, Debug)]
pub struct GroupingOutput {
    /// Primary output, on the rebinned axis when rebin parameters are set.
    pub output: MuonDataset,
    /// The same quantity on the original binning.
    pub raw: MuonDataset,
    /// Pre-normalization intermediates (rebinned, raw); asymmetry only.
    pub unnormalized: Option<(MuonDataset, MuonDataset)>,
    /// Normalization constants (rebinned, raw); asymmetry only.
    pub normalization: Option<(f64, f64)>,
}

/// Reduces one named group in every period, combines the periods, and
/// produces the requested counts or asymmetry outputs.
pub fn group_and_analyze(
    periods: &PeriodSet,
    group: &GroupDefinition,
    options: &AnalysisOptions,
) -> Result<GroupingOutput> {
    options.validate(periods.len())?;
    let detectors = group.detector_ids()?;

    let reduced = periods
        .periods()
        .iter()
        .map(|period| reduce_group(period, &detectors))
        .collect::<Result<Vec<_>>>()?;
    let reduced = PeriodSet::new(reduced)?;

    let mut combined = combine_periods(&reduced, &options.summed_periods, &options.subtracted_periods)?;
    tag_output(&mut combined, group, options);

    match options.analysis_kind {
        AnalysisKind::Counts => {
            let output = if options.rebin_params.is_empty() {
                combined.clone()
            } else {
                rebin_dataset(&combined, &options.rebin_params, true)?
            };
            Ok(GroupingOutput { output, raw: combined, unnormalized: None, normalization: None })
        }
        AnalysisKind::Asymmetry => {
            let (raw_output, raw_unnormalized, raw_norm) = asymmetry_of(&combined, options)?;
            let (output, unnormalized, norm) = if options.rebin_params.is_empty() {
                (raw_output.clone(), raw_unnormalized.clone(), raw_norm)
            } else {
                let rebinned = rebin_dataset(&combined, &options.rebin_params, true)?;
                asymmetry_of(&rebinned, options)?
            };
            Ok(GroupingOutput {
                output,
                raw: raw_output,
                unnormalized: Some((unnormalized, raw_unnormalized)),
                normalization: Some((norm, raw_norm)),
            })
        }
    }
}

/// Runs the estimator on the single spectrum of a reduced dataset and
/// wraps both estimator outputs back into datasets.
fn asymmetry_of(
    data: &MuonDataset,
    options: &AnalysisOptions,
) -> Result<(MuonDataset, MuonDataset, f64)> {
    let spectrum = data.spectra.first().ok_or_else(|| {
        Error::IncompatibleShape("asymmetry estimation needs a reduced spectrum".to_string())
    })?;

    let estimate = estimate_asymmetry(
        spectrum,
        data.meta.good_frames,
        options.time_min,
        options.time_max,
        options.normalization_in,
    )?;

    let mut meta = data.meta.clone();
    meta.tags.insert("normalization".to_string(), estimate.normalization.to_string());
    let asymmetry = MuonDataset::new(meta.clone(), vec![estimate.asymmetry]);
    let unnormalized = MuonDataset::new(meta, vec![estimate.unnormalized]);
    Ok((asymmetry, unnormalized, estimate.normalization))
}

fn tag_output(data: &mut MuonDataset, group: &GroupDefinition, options: &AnalysisOptions) {
    let tags = &mut data.meta.tags;
    tags.insert("group".to_string(), group.name.clone());
    tags.insert("detectors".to_string(), group.detectors.clone());
    tags.insert("periods_summed".to_string(), join_periods(&options.summed_periods));
    tags.insert("periods_subtracted".to_string(), join_periods(&options.subtracted_periods));
}

fn join_periods(periods: &[usize]) -> String {
    periods.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(",")
}

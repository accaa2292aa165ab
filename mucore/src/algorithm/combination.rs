use crate::data::dataset::MuonDataset;
use crate::data::period::PeriodSet;
use crate::error::{Error, Result};

/// Combines periods into one dataset: the summed periods are added, and
/// when a subtracted list is given its sum is taken off the result.
///
/// Period indices are 1-based. Summation is a sequential left fold in list
/// order, so results are reproducible bit for bit. X axes must match
/// across all combined periods.
pub fn combine_periods(
    set: &PeriodSet,
    summed: &[usize],
    subtracted: &[usize],
) -> Result<MuonDataset> {
    if summed.is_empty() && subtracted.is_empty() {
        return Err(Error::Validation(
            "at least one summed or subtracted period is required".to_string(),
        ));
    }
    if summed.is_empty() {
        return Err(Error::Validation(
            "the summed period list must not be empty".to_string(),
        ));
    }

    let total = sum_periods(set, summed)?;
    if subtracted.is_empty() {
        return Ok(total);
    }
    let removed = sum_periods(set, subtracted)?;
    total.checked_sub(&removed)
}

fn sum_periods(set: &PeriodSet, list: &[usize]) -> Result<MuonDataset> {
    let mut accumulated: Option<MuonDataset> = None;
    for &index in list {
        let period = set.get(index)?;
        accumulated = Some(match accumulated {
            Some(sum) => sum.checked_add(period)?,
            None => period.clone(),
        });
    }
    accumulated.ok_or_else(|| Error::Validation("no periods to sum".to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::dataset::RunMeta;
    use crate::data::spectrum::Spectrum;

    fn period(y: Vec<f64>, e: Vec<f64>) -> MuonDataset {
        let x = (0..=y.len()).map(|i| i as f64).collect();
        MuonDataset::new(
            RunMeta::new("EMU", 51341),
            vec![Spectrum::new(x, y, e, BTreeSet::from([1]))],
        )
    }

    fn two_periods() -> PeriodSet {
        PeriodSet::new(vec![
            period(vec![1.0, 2.0, 8.0], vec![1.0, 1.4, 2.8]),
            period(vec![2.0, 9.0, 13.0], vec![1.4, 3.0, 3.6]),
        ])
        .unwrap()
    }

    #[test]
    fn summed_periods_add_elementwise_with_quadrature_errors() {
        let set = two_periods();

        let combined = combine_periods(&set, &[1, 2], &[]).unwrap();

        let spectrum = &combined.spectra[0];
        assert_eq!(spectrum.y, vec![3.0, 11.0, 21.0]);
        for (e, (e1, e2)) in spectrum.e.iter().zip([(1.0_f64, 1.4), (1.4, 3.0), (2.8, 3.6)]) {
            let expected = (e1 * e1 + e2 * e2).sqrt();
            assert!((e - expected).abs() / expected < 1e-9);
        }
    }

    #[test]
    fn subtracted_periods_are_taken_off_the_sum() {
        let set = two_periods();

        let combined = combine_periods(&set, &[1], &[2]).unwrap();

        assert_eq!(combined.spectra[0].y, vec![-1.0, -7.0, -5.0]);
    }

    #[test]
    fn out_of_range_period_is_an_index_error() {
        let set = two_periods();

        let result = combine_periods(&set, &[1, 3], &[]);

        assert_eq!(result.unwrap_err(), Error::PeriodIndex { index: 3, count: 2 });
    }

    #[test]
    fn empty_period_lists_are_rejected() {
        let set = two_periods();

        let result = combine_periods(&set, &[], &[]);

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn mismatched_binning_across_periods_is_rejected() {
        let mut second = period(vec![1.0, 2.0, 3.0], vec![1.0, 1.4, 1.7]);
        second.spectra[0].x = vec![0.0, 0.5, 1.0, 1.5];
        let set = PeriodSet::new(vec![period(vec![1.0, 2.0, 8.0], vec![1.0, 1.4, 2.8]), second])
            .unwrap();

        let result = combine_periods(&set, &[1, 2], &[]);

        assert!(matches!(result, Err(Error::IncompatibleShape(_))));
    }
}

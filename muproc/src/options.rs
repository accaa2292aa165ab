use serde::{Deserialize, Serialize};

use mucore::error::{Error, Result};

/// Which quantity a grouped analysis produces.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum AnalysisKind {
    #[default]
    Counts,
    Asymmetry,
}

/// Options shared by every analysis over one period set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// 1-based periods combined by summation.
    pub summed_periods: Vec<usize>,
    /// 1-based periods whose combination is subtracted afterwards.
    pub subtracted_periods: Vec<usize>,
    /// Lower edge of the asymmetry estimation window in microseconds.
    pub time_min: f64,
    /// Upper edge of the asymmetry estimation window in microseconds.
    pub time_max: f64,
    pub analysis_kind: AnalysisKind,
    /// Fixed normalization constant; 0.0 estimates one from the data.
    pub normalization_in: f64,
    /// Rebin parameters for the non-raw outputs; empty keeps the binning.
    pub rebin_params: Vec<f64>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            summed_periods: vec![1],
            subtracted_periods: Vec::new(),
            time_min: 0.1,
            time_max: 15.0,
            analysis_kind: AnalysisKind::Counts,
            normalization_in: 0.0,
            rebin_params: Vec::new(),
        }
    }
}

impl AnalysisOptions {
    /// Checks the options against the number of available periods.
    pub fn validate(&self, period_count: usize) -> Result<()> {
        if self.summed_periods.is_empty() && self.subtracted_periods.is_empty() {
            return Err(Error::Validation(
                "at least one summed or subtracted period is required".to_string(),
            ));
        }
        for &period in self.summed_periods.iter().chain(self.subtracted_periods.iter()) {
            if period == 0 || period > period_count {
                return Err(Error::PeriodIndex { index: period, count: period_count });
            }
        }
        if self.analysis_kind == AnalysisKind::Asymmetry && self.time_min >= self.time_max {
            return Err(Error::Validation(format!(
                "the estimation window must satisfy start < end, got {}..{}",
                self.time_min, self.time_max
            )));
        }
        if self.normalization_in < 0.0 {
            return Err(Error::Validation(format!(
                "the normalization constant must be zero (estimate) or positive, got {}",
                self.normalization_in
            )));
        }
        Ok(())
    }

    /// Period list rendered for published names, e.g. `1+2-3`. `None` for
    /// the plain single-period default.
    pub fn periods_string(&self) -> Option<String> {
        if self.summed_periods == [1] && self.subtracted_periods.is_empty() {
            return None;
        }
        let mut rendered = self
            .summed_periods
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("+");
        for period in &self.subtracted_periods {
            rendered.push_str(&format!("-{}", period));
        }
        Some(rendered)
    }
}

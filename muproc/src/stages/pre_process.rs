use rayon::prelude::*;

use mucore::algorithm::correction::{correct, CorrectionConfig};
use mucore::data::dataset::MuonDataset;
use mucore::data::period::{CountsInput, PeriodSet};
use mucore::error::Result;

/// First stage of the pipeline: applies the configured corrections to every
/// period of the raw input and yields a corrected period set.
pub struct PreProcessStage {
    config: CorrectionConfig,
}

impl PreProcessStage {
    pub fn new(config: CorrectionConfig) -> Self {
        PreProcessStage { config }
    }

    /// Normalizes the input into a period set, checks the correction tables
    /// against every period before any numeric work, then corrects each
    /// period independently.
    pub fn run(&self, input: CountsInput) -> Result<PeriodSet> {
        let periods = input.normalize()?;
        for period in periods.periods() {
            self.config.validate(period)?;
        }

        let corrected: Vec<MuonDataset> = periods
            .periods()
            .par_iter()
            .map(|period| correct(period, &self.config))
            .collect::<Result<Vec<_>>>()?;
        PeriodSet::new(corrected)
    }
}

use log::debug;

use mucore::algorithm::correction::CorrectionConfig;
use mucore::data::dataset::MuonDataset;
use mucore::data::period::{CountsInput, PeriodSet};
use mucore::error::{Error, Result};

use crate::naming::{ItemClass, OutputKind, OutputName};
use crate::options::{AnalysisKind, AnalysisOptions};
use crate::registry::{Registry, RegistryEntry};
use crate::scheme::{GroupDefinition, GroupingScheme, PairDefinition};
use crate::stages::grouping::group_and_analyze;
use crate::stages::pairing::{pair_and_analyze, PairInput};
use crate::stages::pre_process::PreProcessStage;

/// Progress of one orchestration run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Validated,
    GroupsApplied,
    PairsApplied,
    GroupAsymmetryApplied,
    Published,
}

/// Everything one orchestration run needs besides the raw counts.
#[derive(Clone, Debug, PartialEq)]
pub struct OrchestrationConfig {
    pub scheme: GroupingScheme,
    pub options: AnalysisOptions,
    /// Corrections applied to every period before grouping, if any.
    pub correction: Option<CorrectionConfig>,
    /// Label overriding the generated run label in published names.
    pub label: Option<String>,
    /// Version field of the published names.
    pub version: u32,
    /// Also compute the asymmetry of every declared group.
    pub compute_group_asymmetry: bool,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        OrchestrationConfig {
            scheme: GroupingScheme::default(),
            options: AnalysisOptions::default(),
            correction: None,
            label: None,
            version: 1,
            compute_group_asymmetry: false,
        }
    }
}

/// Drives the grouping and pairing stages for every declared item and
/// publishes the outputs under deterministic names.
///
/// Publication is all-or-nothing per item: every output of a group or pair
/// is computed before the first one is registered, so a failing item
/// registers nothing while earlier items stay registered.
pub struct OrchestrationStage<'a, R: Registry> {
    registry: &'a mut R,
    phase: Option<Phase>,
}

impl<'a, R: Registry> OrchestrationStage<'a, R> {
    pub fn new(registry: &'a mut R) -> Self {
        OrchestrationStage { registry, phase: None }
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Runs the full pipeline over one raw counts input and returns the
    /// published names in publication order.
    pub fn run(&mut self, input: CountsInput, config: &OrchestrationConfig) -> Result<Vec<String>> {
        let periods = match &config.correction {
            Some(correction) => PreProcessStage::new(correction.clone()).run(input)?,
            None => input.normalize()?,
        };

        config.scheme.validate(periods.first())?;
        config.options.validate(periods.len())?;
        self.advance(Phase::Validated);

        let label = config
            .label
            .clone()
            .unwrap_or_else(|| periods.first().meta.run_label());
        let mut published = Vec::new();

        for group in &config.scheme.groups {
            let options = AnalysisOptions {
                analysis_kind: AnalysisKind::Counts,
                ..config.options.clone()
            };
            let result = group_and_analyze(&periods, group, &options)?;
            let name = self.item_name(&label, ItemClass::Group, &group.name, OutputKind::Counts, config);
            self.publish(&name.base(), result.output, &mut published)?;
            self.publish(&name.raw(), result.raw, &mut published)?;
        }
        self.advance(Phase::GroupsApplied);

        for pair in &config.scheme.pairs {
            let result = self.run_pair(&periods, pair, config)?;
            let name = self.item_name(&label, ItemClass::Pair, &pair.name, OutputKind::Asym, config);
            self.publish(&name.base(), result.0, &mut published)?;
            self.publish(&name.raw(), result.1, &mut published)?;
        }
        self.advance(Phase::PairsApplied);

        if config.compute_group_asymmetry {
            for group in &config.scheme.groups {
                let options = AnalysisOptions {
                    analysis_kind: AnalysisKind::Asymmetry,
                    ..config.options.clone()
                };
                let result = group_and_analyze(&periods, group, &options)?;
                let name =
                    self.item_name(&label, ItemClass::Group, &group.name, OutputKind::Asym, config);
                let (unnormalized, unnormalized_raw) =
                    result.unnormalized.ok_or_else(|| {
                        Error::Validation(format!(
                            "asymmetry analysis of group '{}' produced no intermediates",
                            group.name
                        ))
                    })?;
                self.publish(&name.base(), result.output, &mut published)?;
                self.publish(&name.raw(), result.raw, &mut published)?;
                self.publish(&name.unnormalized(), unnormalized, &mut published)?;
                self.publish(&name.unnormalized_raw(), unnormalized_raw, &mut published)?;
            }
            self.advance(Phase::GroupAsymmetryApplied);
        }

        self.advance(Phase::Published);
        Ok(published)
    }

    /// Both pair outputs, (rebinned, raw).
    fn run_pair(
        &self,
        periods: &PeriodSet,
        pair: &PairDefinition,
        config: &OrchestrationConfig,
    ) -> Result<(MuonDataset, MuonDataset)> {
        let forward = self
            .resolve_group(config, &pair.group_1, &pair.name)?
            .detector_ids()?;
        let backward = self
            .resolve_group(config, &pair.group_2, &pair.name)?
            .detector_ids()?;

        let options = AnalysisOptions {
            analysis_kind: AnalysisKind::Asymmetry,
            ..config.options.clone()
        };
        let rebinned = pair_and_analyze(
            PairInput::Manual { periods, forward: forward.clone(), backward: backward.clone() },
            &pair.name,
            pair.alpha,
            &options,
        )?;
        let raw_options = AnalysisOptions { rebin_params: Vec::new(), ..options };
        let raw = pair_and_analyze(
            PairInput::Manual { periods, forward, backward },
            &pair.name,
            pair.alpha,
            &raw_options,
        )?;
        Ok((rebinned, raw))
    }

    fn resolve_group<'c>(
        &self,
        config: &'c OrchestrationConfig,
        group: &str,
        pair: &str,
    ) -> Result<&'c GroupDefinition> {
        config.scheme.group(group).ok_or_else(|| {
            Error::Validation(format!("pair '{}' references unknown group '{}'", pair, group))
        })
    }

    fn item_name(
        &self,
        label: &str,
        item_class: ItemClass,
        item: &str,
        kind: OutputKind,
        config: &OrchestrationConfig,
    ) -> OutputName {
        OutputName::new(label, item_class, item, kind)
            .with_periods(config.options.periods_string())
            .with_version(config.version)
    }

    fn publish(
        &mut self,
        name: &str,
        data: MuonDataset,
        published: &mut Vec<String>,
    ) -> Result<()> {
        self.registry.put(name, RegistryEntry::Dataset(data), true)?;
        published.push(name.to_string());
        Ok(())
    }

    fn advance(&mut self, phase: Phase) {
        debug!("orchestration phase -> {:?}", phase);
        self.phase = Some(phase);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::registry::InMemoryRegistry;
    use crate::scheme::{GroupDefinition, PairDefinition};
    use mucore::data::dataset::{MuonDataset, RunMeta};
    use mucore::data::spectrum::Spectrum;

    fn input() -> CountsInput {
        let spectra = (1..=4)
            .map(|id| {
                let y: Vec<f64> = (1..=4).map(|bin| (id * bin) as f64).collect();
                let e = y.iter().map(|y| y.sqrt()).collect();
                let x = (0..=4).map(|i| i as f64 * 0.5).collect();
                Spectrum::new(x, y, e, BTreeSet::from([id]))
            })
            .collect();
        let mut meta = RunMeta::new("EMU", 51341);
        meta.good_frames = Some(100.0);
        CountsInput::Single(MuonDataset::new(meta, spectra))
    }

    fn config() -> OrchestrationConfig {
        OrchestrationConfig {
            scheme: GroupingScheme {
                groups: vec![
                    GroupDefinition::new("fwd", "1-2"),
                    GroupDefinition::new("bwd", "3-4"),
                ],
                pairs: vec![PairDefinition::new("long", "fwd", "bwd", 1.0)],
            },
            options: AnalysisOptions { time_min: 0.0, time_max: 2.0, ..AnalysisOptions::default() },
            ..OrchestrationConfig::default()
        }
    }

    #[test]
    fn a_full_run_publishes_groups_and_pairs() {
        let mut registry = InMemoryRegistry::new();
        let mut stage = OrchestrationStage::new(&mut registry);

        let published = stage.run(input(), &config()).unwrap();

        assert_eq!(stage.phase(), Some(Phase::Published));
        assert_eq!(
            published,
            vec![
                "EMU00051341; Group; fwd; Counts; #1",
                "EMU00051341; Group; fwd; Counts; #1_Raw",
                "EMU00051341; Group; bwd; Counts; #1",
                "EMU00051341; Group; bwd; Counts; #1_Raw",
                "EMU00051341; Pair; long; Asym; #1",
                "EMU00051341; Pair; long; Asym; #1_Raw",
            ]
        );
        for name in &published {
            assert!(registry.exists(name));
        }
    }

    #[test]
    fn the_group_asymmetry_flag_adds_unnormalized_variants() {
        let mut registry = InMemoryRegistry::new();
        let mut stage = OrchestrationStage::new(&mut registry);
        let config = OrchestrationConfig { compute_group_asymmetry: true, ..config() };

        let published = stage.run(input(), &config).unwrap();

        assert!(published.contains(&"EMU00051341; Group; fwd; Asym; #1".to_string()));
        assert!(published.contains(&"EMU00051341; Group; fwd; Asym; #1_unNorm".to_string()));
        assert!(published.contains(&"EMU00051341; Group; fwd; Asym; #1_unNorm_Raw".to_string()));
        assert_eq!(published.len(), 14);
    }

    #[test]
    fn publishing_twice_yields_identical_names() {
        let mut registry = InMemoryRegistry::new();
        let first = OrchestrationStage::new(&mut registry).run(input(), &config()).unwrap();
        let count = registry.len();
        let second = OrchestrationStage::new(&mut registry).run(input(), &config()).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len(), count);
    }

    #[test]
    fn a_failing_item_keeps_earlier_items_published() {
        let mut registry = InMemoryRegistry::new();
        let mut stage = OrchestrationStage::new(&mut registry);
        let mut config = config();
        // distinct names over the same detectors pass validation but make
        // the pairing stage reject the pair after the groups published
        config.scheme.groups[1] = GroupDefinition::new("bwd", "1-2");
        config.scheme.pairs[0] = PairDefinition::new("long", "fwd", "bwd", 1.0);

        let result = stage.run(input(), &config);

        assert!(result.is_err());
        assert_eq!(registry.len(), 4);
        assert!(registry.exists("EMU00051341; Group; fwd; Counts; #1"));
        assert!(registry.exists("EMU00051341; Group; bwd; Counts; #1_Raw"));
        for name in registry.names() {
            assert!(!name.contains("Pair"));
        }
    }

    #[test]
    fn missing_detectors_fail_validation_with_their_identifiers() {
        let mut registry = InMemoryRegistry::new();
        let mut stage = OrchestrationStage::new(&mut registry);
        let mut config = config();
        config.scheme.groups[1] = GroupDefinition::new("bwd", "3-7");

        let result = stage.run(input(), &config);

        let message = match result {
            Err(Error::Validation(message)) => message,
            other => panic!("expected a validation error, got {:?}", other),
        };
        assert!(message.contains('5'));
        assert_eq!(stage.phase(), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn label_and_version_overrides_flow_into_the_names() {
        let mut registry = InMemoryRegistry::new();
        let mut stage = OrchestrationStage::new(&mut registry);
        let config = OrchestrationConfig {
            label: Some("longitudinal".to_string()),
            version: 3,
            ..config()
        };

        let published = stage.run(input(), &config).unwrap();

        assert!(published.contains(&"longitudinal; Group; fwd; Counts; #3".to_string()));
    }
}

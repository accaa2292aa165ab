use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use mucore::data::dataset::MuonDataset;
use mucore::error::{Error, Result};

/// One named detector group, with its members given as a comma/range
/// string such as `"1-5,8"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupDefinition {
    pub name: String,
    pub detectors: String,
}

impl GroupDefinition {
    pub fn new(name: &str, detectors: &str) -> Self {
        GroupDefinition { name: name.to_string(), detectors: detectors.to_string() }
    }

    pub fn detector_ids(&self) -> Result<BTreeSet<usize>> {
        parse_detector_list(&self.detectors)
    }
}

/// One named pair of opposite groups with its balance factor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairDefinition {
    pub name: String,
    pub group_1: String,
    pub group_2: String,
    pub alpha: f64,
}

impl PairDefinition {
    pub fn new(name: &str, group_1: &str, group_2: &str, alpha: f64) -> Self {
        PairDefinition {
            name: name.to_string(),
            group_1: group_1.to_string(),
            group_2: group_2.to_string(),
            alpha,
        }
    }
}

/// The grouping/pairing declaration of one analysis, usually produced by an
/// external grouping-file loader.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingScheme {
    pub groups: Vec<GroupDefinition>,
    pub pairs: Vec<PairDefinition>,
}

/// Checks the group/pair naming rule: non-empty, letters, digits and
/// underscores only, and not one of the reserved class words.
pub fn validate_item_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("group and pair names must not be empty".to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Validation(format!(
            "'{}' is not a legal item name, only letters, digits and underscores are allowed",
            name
        )));
    }
    if name == "Group" || name == "Pair" {
        return Err(Error::Validation(format!("'{}' is a reserved item name", name)));
    }
    Ok(())
}

/// Parses a comma-separated list of detector numbers and inclusive ranges,
/// e.g. `"1-5,8"`.
pub fn parse_detector_list(list: &str) -> Result<BTreeSet<usize>> {
    let token = Regex::new(r"^(\d+)(?:-(\d+))?$").unwrap();
    let mut ids = BTreeSet::new();
    for raw in list.split(',') {
        let item = raw.trim();
        let captures = token
            .captures(item)
            .ok_or_else(|| Error::Validation(format!("'{}' is not a valid detector token", item)))?;
        let first: usize = captures[1]
            .parse()
            .map_err(|_| Error::Validation(format!("detector number '{}' is out of range", item)))?;
        match captures.get(2) {
            Some(last) => {
                let last: usize = last
                    .as_str()
                    .parse()
                    .map_err(|_| Error::Validation(format!("detector number '{}' is out of range", item)))?;
                if last < first {
                    return Err(Error::Validation(format!("descending detector range '{}'", item)));
                }
                ids.extend(first..=last);
            }
            None => {
                ids.insert(first);
            }
        }
    }
    Ok(ids)
}

impl GroupingScheme {
    pub fn group(&self, name: &str) -> Option<&GroupDefinition> {
        self.groups.iter().find(|group| group.name == name)
    }

    /// Full consistency check against the dataset the scheme will be
    /// applied to: naming rule, unique names, detector coverage, pair
    /// references and balance factors.
    pub fn validate(&self, data: &MuonDataset) -> Result<()> {
        if self.groups.is_empty() {
            return Err(Error::Validation("the grouping scheme declares no groups".to_string()));
        }

        let mut seen = BTreeSet::new();
        for name in self.groups.iter().map(|g| &g.name).chain(self.pairs.iter().map(|p| &p.name)) {
            validate_item_name(name)?;
            if !seen.insert(name.clone()) {
                return Err(Error::Validation(format!("duplicate item name '{}'", name)));
            }
        }

        for group in &self.groups {
            let ids = group.detector_ids()?;
            let missing = data.missing_detectors(&ids);
            if !missing.is_empty() {
                let missing =
                    missing.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");
                return Err(Error::Validation(format!(
                    "group '{}' references detectors missing from the data: {}",
                    group.name, missing
                )));
            }
        }

        for pair in &self.pairs {
            if pair.alpha <= 0.0 {
                return Err(Error::Validation(format!(
                    "pair '{}' needs a positive balance factor, got {}",
                    pair.name, pair.alpha
                )));
            }
            for group in [&pair.group_1, &pair.group_2] {
                if self.group(group).is_none() {
                    return Err(Error::Validation(format!(
                        "pair '{}' references unknown group '{}'",
                        pair.name, group
                    )));
                }
            }
            if pair.group_1 == pair.group_2 {
                return Err(Error::Validation(format!(
                    "pair '{}' references the same group twice",
                    pair.name
                )));
            }
        }
        Ok(())
    }
}

use std::fmt;
use std::fmt::{Display, Formatter};

/// Whether a published item is a detector group or a group pair.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ItemClass {
    Group,
    Pair,
}

impl Display for ItemClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ItemClass::Group => write!(f, "Group"),
            ItemClass::Pair => write!(f, "Pair"),
        }
    }
}

/// The quantity published under a name.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OutputKind {
    Counts,
    Asym,
    Logs,
}

impl Display for OutputKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Counts => write!(f, "Counts"),
            OutputKind::Asym => write!(f, "Asym"),
            OutputKind::Logs => write!(f, "Logs"),
        }
    }
}

/// Deterministic name of one published output,
/// `"<label>; <Group|Pair>; <item>; <Counts|Asym|Logs>; [<periods>; ]#<version>"`.
///
/// The non-rebinned variant carries a `_Raw` suffix, the pre-normalization
/// asymmetry intermediates `_unNorm` and `_unNorm_Raw`.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputName {
    pub label: String,
    pub item_class: ItemClass,
    pub item: String,
    pub kind: OutputKind,
    pub periods: Option<String>,
    pub version: u32,
}

impl OutputName {
    pub fn new(label: &str, item_class: ItemClass, item: &str, kind: OutputKind) -> Self {
        OutputName {
            label: label.to_string(),
            item_class,
            item: item.to_string(),
            kind,
            periods: None,
            version: 1,
        }
    }

    pub fn with_periods(mut self, periods: Option<String>) -> Self {
        self.periods = periods;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// The primary published name.
    pub fn base(&self) -> String {
        match &self.periods {
            Some(periods) => format!(
                "{}; {}; {}; {}; {}; #{}",
                self.label, self.item_class, self.item, self.kind, periods, self.version
            ),
            None => format!(
                "{}; {}; {}; {}; #{}",
                self.label, self.item_class, self.item, self.kind, self.version
            ),
        }
    }

    /// The non-rebinned variant.
    pub fn raw(&self) -> String {
        format!("{}_Raw", self.base())
    }

    /// The pre-normalization asymmetry intermediate.
    pub fn unnormalized(&self) -> String {
        format!("{}_unNorm", self.base())
    }

    /// The non-rebinned pre-normalization intermediate.
    pub fn unnormalized_raw(&self) -> String {
        format!("{}_unNorm_Raw", self.base())
    }
}

impl Display for OutputName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_counts_name_renders_all_fields() {
        let name = OutputName::new("MUSR00015189", ItemClass::Group, "fwd", OutputKind::Counts);

        assert_eq!(name.base(), "MUSR00015189; Group; fwd; Counts; #1");
        assert_eq!(name.raw(), "MUSR00015189; Group; fwd; Counts; #1_Raw");
    }

    #[test]
    fn periods_and_version_are_optional_fields() {
        let name = OutputName::new("EMU00051341", ItemClass::Pair, "long", OutputKind::Asym)
            .with_periods(Some("1+2-3".to_string()))
            .with_version(2);

        assert_eq!(name.base(), "EMU00051341; Pair; long; Asym; 1+2-3; #2");
        assert_eq!(name.unnormalized(), "EMU00051341; Pair; long; Asym; 1+2-3; #2_unNorm");
        assert_eq!(name.unnormalized_raw(), "EMU00051341; Pair; long; Asym; 1+2-3; #2_unNorm_Raw");
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = OutputName::new("EMU00051341", ItemClass::Group, "bwd", OutputKind::Asym);
        let b = OutputName::new("EMU00051341", ItemClass::Group, "bwd", OutputKind::Asym);

        assert_eq!(a.base(), b.base());
        assert_eq!(a.raw(), b.raw());
    }

    #[test]
    fn logs_kind_renders() {
        let name = OutputName::new("EMU00051341", ItemClass::Group, "fwd", OutputKind::Logs);

        assert_eq!(name.base(), "EMU00051341; Group; fwd; Logs; #1");
    }
}

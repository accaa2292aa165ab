use std::collections::BTreeSet;
use std::fmt;
use std::fmt::{Display, Formatter};

use bincode::{Decode, Encode};
use itertools::izip;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Unit carried on the Y axis of a spectrum.
///
/// Raw and grouped data count detector events per time bin; only the final
/// output of the asymmetry transform is tagged `Asymmetry`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize, Encode, Decode)]
pub enum YUnit {
    #[default]
    Counts,
    Asymmetry,
}

impl Display for YUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            YUnit::Counts => write!(f, "Counts"),
            YUnit::Asymmetry => write!(f, "Asymmetry"),
        }
    }
}

/// One time histogram of a pulsed muon measurement.
///
/// `x` holds strictly increasing bin edges (`y.len() + 1` values) or point
/// centres (`y.len()` values), `y` the counts per bin and `e` the standard
/// deviation per bin. `detectors` is the set of channel identifiers that
/// contributed to this spectrum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Spectrum {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub e: Vec<f64>,
    pub detectors: BTreeSet<usize>,
    pub y_unit: YUnit,
}

impl Spectrum {
    /// Constructs a new `Spectrum` with counts on the Y axis.
    ///
    /// # Arguments
    ///
    /// * `x` - Bin edges or point centres.
    /// * `y` - Counts per bin.
    /// * `e` - Standard deviation per bin.
    /// * `detectors` - Channel identifiers owning this spectrum.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeSet;
    /// use mucore::data::spectrum::Spectrum;
    ///
    /// let spectrum = Spectrum::new(vec![0.0, 1.0, 2.0], vec![30.0, 42.0], vec![5.5, 6.5], BTreeSet::from([1]));
    /// assert!(spectrum.is_histogram());
    /// assert_eq!(spectrum.bin_centres(), vec![0.5, 1.5]);
    /// ```
    pub fn new(x: Vec<f64>, y: Vec<f64>, e: Vec<f64>, detectors: BTreeSet<usize>) -> Self {
        Spectrum { x, y, e, detectors, y_unit: YUnit::Counts }
    }

    pub fn points(&self) -> usize {
        self.y.len()
    }

    /// True when `x` holds bin edges rather than point centres.
    pub fn is_histogram(&self) -> bool {
        self.x.len() == self.y.len() + 1
    }

    pub fn x_min(&self) -> f64 {
        self.x.first().copied().unwrap_or(0.0)
    }

    pub fn x_max(&self) -> f64 {
        self.x.last().copied().unwrap_or(0.0)
    }

    /// Mid-point of every bin; for point data this is `x` itself.
    pub fn bin_centres(&self) -> Vec<f64> {
        if self.is_histogram() {
            self.x.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
        } else {
            self.x.clone()
        }
    }

    /// Width of every bin; point data falls back to the spacing between
    /// neighbouring points (1.0 for a single point).
    pub fn bin_widths(&self) -> Vec<f64> {
        if self.is_histogram() {
            return self.x.windows(2).map(|w| w[1] - w[0]).collect();
        }
        match self.x.len() {
            0 => Vec::new(),
            1 => vec![1.0],
            n => (0..n)
                .map(|i| {
                    if i + 1 < n {
                        self.x[i + 1] - self.x[i]
                    } else {
                        self.x[n - 1] - self.x[n - 2]
                    }
                })
                .collect(),
        }
    }

    /// Returns a copy with every X value moved by `offset`.
    pub fn shifted(&self, offset: f64) -> Spectrum {
        Spectrum {
            x: self.x.iter().map(|x| x + offset).collect(),
            y: self.y.clone(),
            e: self.e.clone(),
            detectors: self.detectors.clone(),
            y_unit: self.y_unit,
        }
    }

    /// Returns a copy with Y and E multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Spectrum {
        Spectrum {
            x: self.x.clone(),
            y: self.y.iter().map(|y| y * factor).collect(),
            e: self.e.iter().map(|e| e * factor).collect(),
            detectors: self.detectors.clone(),
            y_unit: self.y_unit,
        }
    }

    /// True when both spectra share exactly the same X axis.
    pub fn same_binning(&self, other: &Spectrum) -> bool {
        self.x == other.x
    }

    /// Elementwise sum with quadrature error combination.
    ///
    /// The X axes must match exactly; the detector sets are united.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeSet;
    /// use mucore::data::spectrum::Spectrum;
    ///
    /// let a = Spectrum::new(vec![0.0, 1.0], vec![3.0], vec![3.0], BTreeSet::from([1]));
    /// let b = Spectrum::new(vec![0.0, 1.0], vec![4.0], vec![4.0], BTreeSet::from([2]));
    /// let sum = a.checked_add(&b).unwrap();
    /// assert_eq!(sum.y, vec![7.0]);
    /// assert_eq!(sum.e, vec![5.0]);
    /// assert_eq!(sum.detectors, BTreeSet::from([1, 2]));
    /// ```
    pub fn checked_add(&self, other: &Spectrum) -> Result<Spectrum> {
        self.combined(other, 1.0)
    }

    /// Elementwise difference with quadrature error combination.
    pub fn checked_sub(&self, other: &Spectrum) -> Result<Spectrum> {
        self.combined(other, -1.0)
    }

    fn combined(&self, other: &Spectrum, sign: f64) -> Result<Spectrum> {
        if !self.same_binning(other) {
            return Err(Error::IncompatibleShape(format!(
                "cannot combine spectra with different x axes ({} vs {} values)",
                self.x.len(),
                other.x.len()
            )));
        }
        let mut y = Vec::with_capacity(self.y.len());
        let mut e = Vec::with_capacity(self.e.len());
        for (y1, e1, y2, e2) in izip!(&self.y, &self.e, &other.y, &other.e) {
            y.push(y1 + sign * y2);
            e.push((e1 * e1 + e2 * e2).sqrt());
        }
        Ok(Spectrum {
            x: self.x.clone(),
            y,
            e,
            detectors: self.detectors.union(&other.detectors).copied().collect(),
            y_unit: self.y_unit,
        })
    }
}

impl Display for Spectrum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let total: f64 = self.y.iter().sum();
        write!(
            f,
            "Spectrum(bins: {}, detectors: {}, total {}: {})",
            self.y.len(),
            self.detectors.len(),
            self.y_unit,
            total
        )
    }
}

// data module
pub mod data {
    pub mod spectrum;
    pub mod dataset;
    pub mod period;
}

// algorithm module
pub mod algorithm {
    pub mod rebin;
    pub mod correction;
    pub mod combination;
    pub mod grouping;
    pub mod asymmetry;
}

pub mod error;

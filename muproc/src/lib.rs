pub mod naming;
pub mod options;
pub mod registry;
pub mod scheme;

// pipeline stages
pub mod stages {
    pub mod pre_process;
    pub mod grouping;
    pub mod pairing;
    pub mod orchestration;
}

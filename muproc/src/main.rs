use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;

use mucore::algorithm::correction::{CorrectionConfig, TimeShift};
use mucore::data::period::CountsInput;
use muproc::options::{AnalysisKind, AnalysisOptions};
use muproc::registry::InMemoryRegistry;
use muproc::scheme::GroupingScheme;
use muproc::stages::orchestration::{OrchestrationConfig, OrchestrationStage};

/// Reduce raw multi-period muon counts into grouped counts and pair
/// asymmetry curves.
#[derive(Parser, Debug)]
#[command(name = "muproc", version, about)]
struct Args {
    /// JSON file holding the raw counts input (single dataset or period list).
    #[arg(long)]
    data: PathBuf,

    /// JSON file holding the grouping/pairing scheme.
    #[arg(long)]
    grouping: PathBuf,

    /// Also compute the asymmetry of every group.
    #[arg(long)]
    group_asymmetry: bool,

    /// 1-based periods to sum, e.g. "1,2".
    #[arg(long, default_value = "1")]
    summed_periods: String,

    /// 1-based periods to subtract after summation, e.g. "3".
    #[arg(long)]
    subtracted_periods: Option<String>,

    /// Lower edge of the asymmetry estimation window in microseconds.
    #[arg(long, default_value_t = 0.1)]
    time_min: f64,

    /// Upper edge of the asymmetry estimation window in microseconds.
    #[arg(long, default_value_t = 15.0)]
    time_max: f64,

    /// Fixed normalization constant; 0 estimates one from the data.
    #[arg(long, default_value_t = 0.0)]
    normalization: f64,

    /// Rebin parameters, e.g. "0.016" or "0,0.016,32".
    #[arg(long)]
    rebin: Option<String>,

    /// Scalar time offset added to every spectrum, microseconds.
    #[arg(long)]
    time_offset: Option<f64>,

    /// JSON file with one dead-time coefficient per detector channel.
    #[arg(long)]
    dead_time_table: Option<PathBuf>,

    /// JSON file with one time-zero offset per spectrum.
    #[arg(long)]
    time_zero_table: Option<PathBuf>,

    /// Lower crop bound applied before rebinning, microseconds.
    #[arg(long)]
    crop_min: Option<f64>,

    /// Upper crop bound applied before rebinning, microseconds.
    #[arg(long)]
    crop_max: Option<f64>,

    /// Label overriding the generated run label in published names.
    #[arg(long)]
    label: Option<String>,

    /// Version field of the published names.
    #[arg(long, default_value_t = 1)]
    version_tag: u32,

    /// Write the filled registry to this JSON file.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_period_list(list: &str) -> Result<Vec<usize>, String> {
    list.split(',')
        .map(|token| {
            token
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("'{}' is not a valid period number", token))
        })
        .collect()
}

fn parse_float_list(list: &str) -> Result<Vec<f64>, String> {
    list.split(',')
        .map(|token| {
            token
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a valid rebin parameter", token))
        })
        .collect()
}

fn correction_from(args: &Args) -> Result<Option<CorrectionConfig>, Box<dyn std::error::Error>> {
    if args.time_offset.is_some() && args.time_zero_table.is_some() {
        return Err("--time-offset and --time-zero-table are mutually exclusive".into());
    }

    let time_shift = if let Some(path) = &args.time_zero_table {
        let rows: Vec<f64> = serde_json::from_str(&fs::read_to_string(path)?)?;
        Some(TimeShift::Table(rows))
    } else {
        args.time_offset.map(TimeShift::Offset)
    };

    let dead_times = match &args.dead_time_table {
        Some(path) => Some(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => None,
    };

    let config = CorrectionConfig {
        dead_times,
        time_shift,
        crop_min: args.crop_min,
        crop_max: args.crop_max,
        rebin_params: Vec::new(),
    };
    Ok(if config.is_empty() { None } else { Some(config) })
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let input: CountsInput = serde_json::from_str(&fs::read_to_string(&args.data)?)?;
    let scheme: GroupingScheme = serde_json::from_str(&fs::read_to_string(&args.grouping)?)?;

    let options = AnalysisOptions {
        summed_periods: parse_period_list(&args.summed_periods)?,
        subtracted_periods: match &args.subtracted_periods {
            Some(list) => parse_period_list(list)?,
            None => Vec::new(),
        },
        time_min: args.time_min,
        time_max: args.time_max,
        analysis_kind: AnalysisKind::Counts,
        normalization_in: args.normalization,
        rebin_params: match &args.rebin {
            Some(list) => parse_float_list(list)?,
            None => Vec::new(),
        },
    };

    let config = OrchestrationConfig {
        scheme,
        options,
        correction: correction_from(&args)?,
        label: args.label.clone(),
        version: args.version_tag,
        compute_group_asymmetry: args.group_asymmetry,
    };

    let mut registry = InMemoryRegistry::new();
    let mut stage = OrchestrationStage::new(&mut registry);
    let published = stage.run(input, &config)?;

    for name in &published {
        println!("{}", name);
    }
    info!("published {} item(s)", published.len());

    if let Some(path) = &args.output {
        fs::write(path, serde_json::to_string_pretty(&registry)?)?;
        info!("registry written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use std::path::Path;
use std::path::PathBuf;
use survey_geo::batch::collect_inputs;
use survey_geo::batch::worker::BatchWorker;
use survey_geo::batch::worker::WorkerEvent;
use survey_geo::config::Config;
use tracing_subscriber::EnvFilter;

/// Convert road-survey Excel workbooks into GeoJSON, Shapefile and PNG outputs.
#[derive(Parser, Debug)]
#[command(name = "survey-geo", version, about)]
struct Args {
    /// Workbook (.xlsx, .xlsm, .xls) or folder of workbooks
    input: PathBuf,

    /// Output folder [default: <parent of input>/Conversion Result]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Region boundary file (.shp or .geojson) used to partition outputs
    #[arg(long)]
    boundary: Option<PathBuf>,

    /// Folder of .qml styles copied next to each shapefile
    #[arg(long)]
    styles: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    no_geojson: bool,

    #[arg(long)]
    no_shapefile: bool,

    #[arg(long)]
    no_images: bool,

    #[arg(long)]
    no_error_log: bool,

    /// Keep data rows whose cells are all blank
    #[arg(long)]
    keep_blank_rows: bool,

    /// Do not parse degree-minute-second coordinates
    #[arg(long)]
    no_dms: bool,

    /// Only convert sheets matching this glob pattern (repeatable)
    #[arg(long = "sheet", value_name = "PATTERN")]
    sheets: Vec<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// File configuration with command-line overrides applied.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if self.boundary.is_some() {
            config.regions.boundary = self.boundary.clone();
        }
        if self.styles.is_some() {
            config.regions.styles = self.styles.clone();
        }
        config.output.geojson &= !self.no_geojson;
        config.output.shapefile &= !self.no_shapefile;
        config.output.images &= !self.no_images;
        config.output.error_log &= !self.no_error_log;
        config.pipeline.drop_blank_rows &= !self.keep_blank_rows;
        config.pipeline.parse_dms &= !self.no_dms;
        if !self.sheets.is_empty() {
            config.pipeline.sheets = self.sheets.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn output_root(&self) -> PathBuf {
        match &self.output {
            Some(output) => output.clone(),
            None => self
                .input
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .join("Conversion Result"),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = args.resolve_config().context("Invalid configuration")?;
    let inputs = collect_inputs(&args.input).with_context(|| format!("Cannot read input '{}'", args.input.display()))?;
    if inputs.is_empty() {
        anyhow::bail!("No workbooks found in '{}'", args.input.display());
    }
    let output_root = args.output_root();
    tracing::info!("Converting {} workbooks into '{}'", inputs.len(), output_root.display());

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    let worker = BatchWorker::spawn(inputs, output_root, config);
    let report = worker
        .wait(|event| match event {
            WorkerEvent::Log(message) => bar.println(message),
            WorkerEvent::Progress(percent) => bar.set_position(u64::from(*percent)),
            WorkerEvent::Finished(_) => {}
        })
        .map_err(anyhow::Error::msg)?;
    bar.finish_and_clear();

    for workbook in &report.workbooks {
        println!("{}", workbook.summary());
    }
    if let Some(path) = &report.error_log {
        println!("Coordinate error log: {}", path.display());
    }
    println!("{}", report.summary());
    Ok(())
}

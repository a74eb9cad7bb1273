use std::path::PathBuf;

use crate::{
    collect::{self, CollectOptions, Interrupts, TerminationOutcome},
    config::DoctorConfig,
    local_logger::{DOCTOR_U8_COLOR_CODE, init_local_logger},
    prelude::*,
    report::{self, VisualizeOptions},
};
use clap::{
    Args, Parser, Subcommand,
    builder::{Styles, styling},
};

fn create_styles() -> Styles {
    styling::Styles::styled()
        .header(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(styling::Ansi256Color(DOCTOR_U8_COLOR_CODE).on_default() | styling::Effects::BOLD)
        .placeholder(styling::AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(version, about = "Diagnose the performance of a process", styles = create_styles())]
pub struct Cli {
    /// The configuration name to use
    /// If provided, the configuration will be loaded from ~/.config/perf-doctor/{config-name}.yaml
    /// Otherwise, loads from ~/.config/perf-doctor/config.yaml
    #[arg(long, env = "PERF_DOCTOR_CONFIG_NAME", global = true)]
    pub config_name: Option<String>,

    /// Directory holding a `doctor.js` replacing the bundled report script
    #[arg(long, env = "PERF_DOCTOR_ASSETS_DIR", global = true)]
    pub assets_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command under instrumentation, then build its report
    Collect(CollectArgs),
    /// Build the report of an existing capture directory
    Visualize(VisualizeArgs),
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Sampling cadence of the injected sampler, in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub sample_interval: Option<u64>,

    /// Module preloaded into the process to sample its resource usage
    #[arg(long)]
    pub sampler: Option<String>,

    /// Only capture, do not build the report
    #[arg(long, default_value_t = false)]
    pub no_visualize: bool,

    /// Where to write the report, defaults to `<capture-dir>.html`
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// The command to run
    #[arg(required = true, last = true)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VisualizeArgs {
    /// Capture directory, as created by `collect`
    pub capture_dir: PathBuf,

    /// Where to write the report, defaults to `<capture-dir>.html`
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

// In the context of the CI, it is likely that a ~ made its way here without being expanded by the shell
fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

impl CollectArgs {
    fn apply_to(&self, config: &mut DoctorConfig) {
        if let Some(sample_interval) = self.sample_interval {
            config.sample_interval = sample_interval;
        }
        if let Some(sampler) = &self.sampler {
            config.sampler = Some(expand_path(sampler));
        }
    }
}

async fn run_collect(args: CollectArgs, config: DoctorConfig) -> Result<()> {
    let mut config = config;
    args.apply_to(&mut config);
    let visualize_options = VisualizeOptions {
        assets_dir: config.assets_dir.clone(),
    };

    let options = CollectOptions::new(config)?;
    let mut interrupts = Interrupts::from_os()?;

    start_group!(format!("Collecting `{}`", args.command.join(" ")));
    let capture = collect::collect(&args.command, &options, &mut interrupts).await?;
    end_group!();
    info!("Capture saved in {}", capture.paths.root.display());

    if args.no_visualize {
        return Ok(());
    }
    if let TerminationOutcome::InterruptedBySignal(_) = capture.outcome {
        debug!("Building the report of an interrupted capture");
    }

    let output = args
        .output
        .unwrap_or_else(|| report::default_output(&capture.paths.root));
    start_group!("Assembling report");
    report::visualize(&capture.paths.root, &output, &visualize_options).await?;
    end_group!();
    Ok(())
}

async fn run_visualize(args: VisualizeArgs, config: DoctorConfig) -> Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| report::default_output(&args.capture_dir));
    let options = VisualizeOptions {
        assets_dir: config.assets_dir,
    };

    start_group!("Assembling report");
    report::visualize(&args.capture_dir, &output, &options).await?;
    end_group!();
    Ok(())
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_local_logger()?;

    let mut config = DoctorConfig::load(cli.config_name.as_deref())?;
    if let Some(assets_dir) = &cli.assets_dir {
        config.assets_dir = Some(expand_path(assets_dir));
    }

    match cli.command {
        Commands::Collect(args) => run_collect(args, config).await?,
        Commands::Visualize(args) => run_visualize(args, config).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_collect() {
        let cli = Cli::try_parse_from([
            "perf-doctor",
            "collect",
            "--sample-interval",
            "25",
            "--no-visualize",
            "--",
            "node",
            "server.js",
            "--port",
            "3000",
        ])
        .unwrap();

        let Commands::Collect(args) = cli.command else {
            panic!("expected the collect command");
        };
        assert_eq!(args.sample_interval, Some(25));
        assert!(args.no_visualize);
        assert_eq!(args.command, ["node", "server.js", "--port", "3000"]);

        let mut config = DoctorConfig::default();
        args.apply_to(&mut config);
        assert_eq!(config.sample_interval, 25);
        assert_eq!(config.sampler, None);
    }

    #[test]
    fn test_sample_interval_must_be_positive() {
        let result = Cli::try_parse_from([
            "perf-doctor",
            "collect",
            "--sample-interval",
            "0",
            "--",
            "true",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_collect_requires_a_command() {
        assert!(Cli::try_parse_from(["perf-doctor", "collect"]).is_err());
    }
}

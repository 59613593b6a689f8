//! waypointer: acceptance runs against the TravelDot app
//!
//! ## Usage
//!
//! ```bash
//! waypointer auth                          # register, then log in
//! waypointer upload --timeout-ms 45000     # upload a photo and judge it
//! waypointer judge timeline.yaml           # replay recorded evidence
//! waypointer config init                   # write waypoint.yaml
//! ```
//!
//! Exit codes: 0 pass, 1 fail or error, 2 blocked, 3 inconclusive.

use clap::Parser;
use std::process::ExitCode;
use waypoint::{RunReport, RunVerdict};
use waypoint_cli::{
    handlers::{emit_report, execute_auth, execute_config, execute_judge, execute_upload},
    logging::init_logging,
    Cli, CliConfig, CliResult, ColorChoice, Commands, OutputArgs, ProgressReporter, Verbosity,
};

fn main() -> ExitCode {
    match run() {
        Ok(verdict) => ExitCode::from(u8::try_from(verdict.exit_code()).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<RunVerdict> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(&config);
    let cwd = std::env::current_dir()?;

    let (report, output): (RunReport, &OutputArgs) = match &cli.command {
        Commands::Config(args) => {
            let message = execute_config(&config, &cwd, &args.action)?;
            println!("{message}");
            return Ok(RunVerdict::Pass);
        }
        Commands::Auth(args) => {
            let settings = config.load_settings(&cwd)?;
            let report = runtime()?.block_on(execute_auth(&config, settings, args))?;
            (report, &args.run.output)
        }
        Commands::Upload(args) => {
            let settings = config.load_settings(&cwd)?;
            let report = runtime()?.block_on(execute_upload(&config, settings, args))?;
            (report, &args.run.output)
        }
        Commands::Judge(args) => {
            let settings = config.load_settings(&cwd)?;
            let report = runtime()?.block_on(execute_judge(settings, args))?;
            (report, &args.output)
        }
    };

    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    emit_report(&reporter, &report, output)?;
    Ok(report.verdict)
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_log_json(cli.log_json)
        .with_settings_path(cli.config.clone())
}

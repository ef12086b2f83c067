use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use haltpoint_core::config::EngineConfig;
use haltpoint_core::factory::{BreakpointFactory, DebuggingContext};
use haltpoint_core::manager::BreakpointManager;
use haltpoint_utils::{default_trace_file, info, LogConfig, LogFormat, LogGuard, LogLevel, LoggingError};

mod replay;
mod script;

use replay::Replay;

/// Breakpoint and conditional event engine for JVM-style debuggers.
#[derive(Parser, Debug)]
#[command(name = "haltpoint")]
#[command(version)]
#[command(about = "Define, group and gate breakpoints against a debug target", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format: pretty or json (overrides HALTPOINT_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Check a breakpoint command and show what it would create
    Parse
    {
        /// Breakpoint command, e.g. `go com.acme.Foo:10 t:main`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Run a script against an in-memory target
    Replay
    {
        /// Script file
        script: PathBuf,
        /// Restore breakpoints from this file before running
        #[arg(long)]
        breakpoints: Option<PathBuf>,
        /// Save the breakpoints to this file afterwards
        #[arg(long)]
        save: Option<PathBuf>,
        /// Write trace and monitor output to this file
        /// (default: ~/.haltpoint/<date>-trace.log)
        #[arg(long, num_args = 0..=1)]
        trace_file: Option<Option<PathBuf>>,
    },
    /// List the breakpoints stored in a saved file
    Show
    {
        /// File written by `replay --save`
        file: PathBuf,
    },
}

fn main()
{
    let cli = Cli::parse();

    let trace_file = match &cli.command {
        Commands::Replay { trace_file, .. } => trace_file.clone(),
        _ => None,
    };
    let _log_guard = match init_logging(&cli, trace_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(cli: &Cli, trace_file: Option<Option<PathBuf>>) -> Result<LogGuard, LoggingError>
{
    let mut config = LogConfig::from_env()?;
    if let Some(level) = cli.log_level {
        config = config.with_level(level);
    }
    if let Some(format) = cli.log_format {
        config = config.with_format(format);
    }
    match trace_file {
        Some(Some(path)) => config = config.with_trace_file(path),
        Some(None) => config = config.with_trace_file(default_trace_file()?),
        None => {}
    }
    config.init()
}

fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>>
{
    match cli.command {
        Commands::Parse { command } => {
            let command = command.join(" ");
            let breakpoint = BreakpointFactory::new().create_from_command(&command, &DebuggingContext::default(), &[])?;
            println!("Kind:    {}", breakpoint.kind().label());
            println!("Suspend: {}", breakpoint.suspend_policy());
            println!("Command: {}", breakpoint.describe());
            Ok(())
        }
        Commands::Replay {
            script,
            breakpoints,
            save,
            trace_file: _,
        } => {
            let text = std::fs::read_to_string(&script)?;
            let steps = script::parse_script(&text)?;
            info!("Replaying {} steps from {}", steps.len(), script.display());

            let config = EngineConfig::from_env();
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let replay = Replay::start(config);
                if let Some(path) = &breakpoints {
                    replay.session().manager().load_from(path)?;
                }
                replay.run(steps).await?;
                if let Some(path) = &save {
                    replay.session().manager().save_to(path)?;
                    println!("Saved breakpoints to {}", path.display());
                }
                replay.finish().await;
                Ok::<(), Box<dyn std::error::Error>>(())
            })
        }
        Commands::Show { file } => {
            let manager = BreakpointManager::new();
            manager.load_from(&file)?;
            for id in manager.all_breakpoints() {
                if let Some(breakpoint) = manager.breakpoint(id) {
                    let enabled = if breakpoint.is_enabled() { "enabled" } else { "disabled" };
                    println!("{breakpoint} ({enabled})");
                }
            }
            Ok(())
        }
    }
}

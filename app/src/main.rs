use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, Subcommand};
use common::config::{LOG_FILE, OutputDir};
use eyre::{Context, Result};
use fio::{Fio, config::load_test_configs, history::History, report::Report};
use fio_history::{Analyzer, render::Renderer};
use regex::Regex;
use tokio::fs::create_dir_all;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use monitor::{Mode, Monitor, Shutdown};

mod monitor;

const MODULES: &[&str] = &["fio_monitor", "fio", "common", "fio_history"];

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = false)]
    no_progress: bool,
    #[arg(short, long)]
    log: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fio tests once or periodically and keep their history
    Monitor {
        /// JSON or YAML list of tests, the builtin test when absent
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, default_value = "fio_results")]
        output: PathBuf,
        /// Minutes between cycles
        #[arg(short, long, default_value_t = 60)]
        interval: u64,
        /// Stop after this many cycles
        #[arg(short = 'n', long)]
        cycles: Option<usize>,
        #[arg(long, default_value_t = false)]
        single_run: bool,
        /// fio executable
        #[arg(long, default_value = "fio")]
        program: String,
        /// Start with an empty history instead of the stored one
        #[arg(long, default_value_t = false)]
        reset_history: bool,
    },
    /// Export, summarize and plot the stored history
    Analyze {
        #[arg(short, long, default_value = "fio_results")]
        output: PathBuf,
        /// Only tests whose name matches this regex
        #[arg(long)]
        filter: Option<Regex>,
        /// Do not generate plots
        #[arg(long, default_value_t = false)]
        skip_plot: bool,
        /// Python script drawing the charts
        #[arg(long)]
        plot_script: Option<PathBuf>,
    },
    /// Regenerate the report from the stored history
    Report {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, default_value = "fio_results")]
        output: PathBuf,
    },
    /// Print generated fio commands
    Print {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(directives: &[String], log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("info".to_owned());
    let mut env_filter = EnvFilter::new(format!("warn,fio_monitor={log_level}"));

    for log in directives {
        env_filter = env_filter.add_directive(log.parse()?);
    }

    for module in MODULES {
        if !directives.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = layer().with_writer(non_blocking).with_ansi(false);
            (Some(file_layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    match args.command {
        Commands::Monitor {
            config,
            output,
            interval,
            cycles,
            single_run,
            program,
            reset_history,
        } => {
            create_dir_all(&output)
                .await
                .context(format!("Creating {}", output.display()))?;
            let _guard = init_logging(&args.log, Some(&output))?;

            let mode = if single_run {
                Mode::Single
            } else {
                Mode::Periodic {
                    interval: Duration::from_secs(interval.saturating_mul(60)),
                    cycles,
                }
            };
            let monitor = MonitorArgs {
                config,
                out: OutputDir::new(output),
                mode,
                program,
                reset_history,
                progress: !args.no_progress,
            };
            if let Err(err) = run_monitor(monitor).await {
                error!("{err:#?}");
                return Err(err);
            }
        }
        Commands::Analyze {
            output,
            filter,
            skip_plot,
            plot_script,
        } => {
            init_logging(&args.log, None)?;
            let renderer = match plot_script {
                _ if skip_plot => None,
                Some(script) => Some(Renderer::default().with_script(script)),
                None => Some(Renderer::default()),
            };
            let analyzer = Analyzer::new(OutputDir::new(output))
                .with_filter(filter)
                .with_renderer(renderer);
            if analyzer.run().await?.is_none() {
                warn!("Nothing to analyze");
            }
        }
        Commands::Report { config, output } => {
            init_logging(&args.log, None)?;
            report(config.as_deref(), &OutputDir::new(output)).await?;
        }
        Commands::Print { config } => {
            init_logging(&args.log, None)?;
            print_commands(config.as_deref()).await?;
        }
    };

    Ok(())
}

struct MonitorArgs {
    config: Option<PathBuf>,
    out: OutputDir,
    mode: Mode,
    program: String,
    reset_history: bool,
    progress: bool,
}

async fn run_monitor(args: MonitorArgs) -> Result<()> {
    let configs = load_test_configs(args.config.as_deref()).await?;
    info!("Loaded {} tests", configs.len());

    let history_path = args.out.history();
    let history = if args.reset_history {
        History::new(history_path)
    } else {
        History::load(history_path).await?
    };
    if !history.is_empty() {
        info!("Continuing history with {} results", history.len());
    }

    let shutdown = Shutdown::from_signals();
    let mut monitor = Monitor::new(Fio::new(args.program), configs, history, args.out)
        .with_progress(args.progress);
    monitor.run(args.mode, shutdown).await;
    Ok(())
}

async fn report(config: Option<&Path>, out: &OutputDir) -> Result<()> {
    let configs = load_test_configs(config).await?;
    let history_path = out.history();
    let Some(history) = History::open(&history_path).await? else {
        warn!("History file {} not found", history_path.display());
        return Ok(());
    };

    if let Some(report) = Report::generate(&configs, &history) {
        let path = out.report();
        report.write(&path).await?;
        println!("{}", path.display());
    }
    Ok(())
}

async fn print_commands(config: Option<&Path>) -> Result<()> {
    let fio = Fio::default();
    for config in load_test_configs(config).await? {
        println!("{}", config.name);
        println!("timeout: {:?}", fio.timeout(&config));
        println!("{}\n", fio.cmd(&config));
    }
    Ok(())
}

use std::time::Duration;

use chrono::{Local, TimeDelta};
use common::config::OutputDir;
use fio::{
    Fio,
    config::TestConfig,
    history::{History, save_run},
    record::TestResult,
    report::Report,
};
use flume::Receiver;
use indicatif::ProgressBar;
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Every test once, then a report
    Single,
    /// Cycles of every test separated by `interval`, forever unless `cycles` is set
    Periodic {
        interval: Duration,
        cycles: Option<usize>,
    },
}

/// Observes shutdown requests between tests and while waiting for the
/// next cycle. A running fio is not interrupted.
pub struct Shutdown {
    rx: Receiver<()>,
    triggered: bool,
}

impl Shutdown {
    pub fn new(rx: Receiver<()>) -> Self {
        Shutdown {
            rx,
            triggered: false,
        }
    }

    /// Listens for Ctrl-C and SIGTERM
    pub fn from_signals() -> Self {
        let (tx, rx) = flume::bounded(1);
        tokio::spawn(async move {
            wait_for_signal().await;
            _ = tx.send_async(()).await;
        });
        Shutdown::new(rx)
    }

    pub fn triggered(&mut self) -> bool {
        if !self.triggered && self.rx.try_recv().is_ok() {
            self.triggered = true;
        }
        self.triggered
    }

    /// Sleeps for `duration`, `false` if a shutdown cut it short
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.triggered() {
            return false;
        }
        tokio::select! {
            _ = sleep(duration) => true,
            Ok(()) = self.rx.recv_async() => {
                self.triggered = true;
                false
            }
        }
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("Could not listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

pub struct Monitor {
    fio: Fio,
    configs: Vec<TestConfig>,
    history: History,
    out: OutputDir,
    progress: bool,
}

impl Monitor {
    pub fn new(fio: Fio, configs: Vec<TestConfig>, history: History, out: OutputDir) -> Self {
        Monitor {
            fio,
            configs,
            history,
            out,
            progress: true,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    fn spinner(&self, message: String) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new_spinner();
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }

    /// Writes the run file, then the whole history. Failures are logged,
    /// the result stays in memory and goes out with the next persist.
    async fn save(&mut self, result: TestResult) {
        if let Err(err) = save_run(&self.out, &result).await {
            error!("Could not save results of {}: {err:#}", result.test_name);
        }
        self.history.append(Some(result));
        if let Err(err) = self.history.persist().await {
            error!("Could not persist history: {err:#}");
        }
    }

    async fn report(&self) {
        let Some(report) = Report::generate(&self.configs, &self.history) else {
            return;
        };
        if let Err(err) = report.write(&self.out.report()).await {
            error!("Could not write report: {err:#}");
        }
    }

    /// Runs every test once in order, `false` if a shutdown stopped the cycle early
    async fn run_cycle(&mut self, shutdown: &mut Shutdown) -> bool {
        for i in 0..self.configs.len() {
            if shutdown.triggered() {
                return false;
            }
            let config = &self.configs[i];
            let spinner = self.spinner(format!("Running {}", config.name));
            let result = self.fio.run_test(config).await;
            spinner.finish_and_clear();

            if let Some(result) = result {
                self.save(result).await;
            }
        }
        true
    }

    pub async fn run(&mut self, mode: Mode, mut shutdown: Shutdown) {
        match mode {
            Mode::Single => {
                if !self.run_cycle(&mut shutdown).await {
                    info!("Stopped before all tests ran");
                }
                self.report().await;
            }
            Mode::Periodic { interval, cycles } => {
                info!(
                    "Starting monitoring with an interval of {} minutes",
                    interval.as_secs() / 60
                );
                let mut cycle = 0;
                while cycles.is_none_or(|max| cycle < max) {
                    cycle += 1;
                    info!("Monitoring cycle #{cycle}");
                    let completed = self.run_cycle(&mut shutdown).await;
                    self.report().await;
                    if !completed || cycles.is_some_and(|max| cycle >= max) {
                        break;
                    }

                    info!(
                        "Waiting {} minutes until the next cycle",
                        interval.as_secs() / 60
                    );
                    let message = TimeDelta::from_std(interval)
                        .ok()
                        .and_then(|x| Local::now().checked_add_signed(x))
                        .map(|next| format!("Next cycle at {}", next.format("%H:%M")))
                        .unwrap_or_else(|| "Waiting for the next cycle".to_owned());
                    let spinner = self.spinner(message);
                    let slept = shutdown.sleep(interval).await;
                    spinner.finish_and_clear();
                    if !slept {
                        break;
                    }
                }
                if shutdown.triggered() {
                    info!("Monitoring stopped by user");
                }
                info!("Monitoring finished after {cycle} cycles");
            }
        }
    }
}

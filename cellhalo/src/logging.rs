use std::env;
use std::io::Write;

use anyhow::anyhow;
use fern::Output;
use indicatif::{ProgressBar, ProgressStyle, WeakProgressBar};
use log::{error, info};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::cli::VerbosityLevel;

/// Writer that suspends the current progress bar while a log line is written
#[derive(Debug)]
pub struct ProgressHandler<T: Write + Send>(T);

/// The progress bar that log output has to be routed around, if one is shown
static CURRENT_PROGRESS_BAR: Lazy<RwLock<Option<WeakProgressBar>>> =
    Lazy::new(|| RwLock::new(None));

impl<T: Write + Send> ProgressHandler<T> {
    fn handle<F: FnOnce(&mut Self) -> R, R>(&mut self, inner_function: F) -> R {
        match get_progress_bar() {
            Some(pb) => pb.suspend(|| inner_function(self)),
            None => inner_function(self),
        }
    }

    pub fn new(pipe: T) -> Self {
        Self(pipe)
    }
}

impl<T: Write + Send + 'static> ProgressHandler<T> {
    pub fn into_output(self) -> Output {
        let boxed: Box<dyn Write + Send + 'static> = Box::new(self);
        boxed.into()
    }
}

impl<T: Write + Send> Write for ProgressHandler<T> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.handle(|this| this.0.write(buf))
    }

    #[inline]
    fn flush(&mut self) -> std::io::Result<()> {
        self.handle(|this| this.0.flush())
    }
}

/// A registered step progress bar, unregistered and cleared on drop
pub(crate) struct StepProgress {
    bar: ProgressBar,
}

impl StepProgress {
    /// Shows a progress bar over `steps` simulation steps and routes log output around it
    pub(crate) fn new(steps: usize) -> Result<Self, anyhow::Error> {
        let bar = ProgressBar::new(steps as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40}] step {pos}/{len} ({per_sec}) - remaining: [{eta_precise}]",
            )?
            .progress_chars("=> "),
        );
        set_progress_bar(Some(bar.downgrade()));
        Ok(Self { bar })
    }

    /// Sets the number of finished steps
    pub(crate) fn set_finished(&self, steps: usize) {
        self.bar.set_position(steps as u64);
    }
}

impl Drop for StepProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
        set_progress_bar(None);
    }
}

fn set_progress_bar(pb: Option<WeakProgressBar>) {
    *CURRENT_PROGRESS_BAR.write() = pb;
}

fn get_progress_bar() -> Option<ProgressBar> {
    CURRENT_PROGRESS_BAR.read().as_ref()?.upgrade()
}

/// Prints an anyhow error and its full error chain using the log::error macro
pub(crate) fn log_error(err: &anyhow::Error) {
    error!("Error occurred: {}", err);
    err.chain()
        .skip(1)
        .for_each(|cause| error!("  caused by: {}", cause));
}

/// Initializes logging with fern
pub(crate) fn initialize_logging(
    verbosity: VerbosityLevel,
    quiet_mode: bool,
) -> Result<(), anyhow::Error> {
    let mut unknown_log_filter_level = None;
    let log_filter_level = if quiet_mode {
        log::LevelFilter::Off
    } else {
        // Explicit verbosity wins over the environment
        verbosity.into_filter().unwrap_or_else(|| {
            if let Some(log_level) = env::var_os("RUST_LOG") {
                let log_level = log_level.to_string_lossy().to_ascii_lowercase();
                match log_level.as_str() {
                    "off" => log::LevelFilter::Off,
                    "error" => log::LevelFilter::Error,
                    "warn" => log::LevelFilter::Warn,
                    "info" => log::LevelFilter::Info,
                    "debug" => log::LevelFilter::Debug,
                    "trace" => log::LevelFilter::Trace,
                    _ => {
                        unknown_log_filter_level = Some(log_level);
                        log::LevelFilter::Info
                    }
                }
            } else {
                log::LevelFilter::Info
            }
        })
    };

    if matches!(verbosity, VerbosityLevel::None) {
        build_logger(log_filter_level, |out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                chrono::Local::now().format("%T%.3f"),
                record.level(),
                message
            ))
        })?;
    } else {
        // Rank threads are named, which tells apart the interleaved output of the subdomains
        build_logger(log_filter_level, |out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}][{}] {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false),
                std::thread::current().name().unwrap_or("-"),
                record.target(),
                record.level(),
                message
            ))
        })?;
    }

    if let Some(filter_level) = unknown_log_filter_level {
        error!(
            "Unknown log filter level '{}' defined in 'RUST_LOG' env variable, using INFO instead.",
            filter_level
        );
    }

    Ok(())
}

fn build_logger<F>(log_filter_level: log::LevelFilter, formatter: F) -> Result<(), anyhow::Error>
where
    F: Fn(fern::FormatCallback, &std::fmt::Arguments, &log::Record) + Sync + Send + 'static,
{
    fern::Dispatch::new()
        .format(formatter)
        .level(log_filter_level)
        .chain(ProgressHandler::new(std::io::stdout()).into_output())
        .apply()
        .map_err(|e| anyhow!("Unable to apply logger configuration ({:?})", e))
}

/// Prints program name, version and the command line to the log
pub(crate) fn log_program_info() {
    info!(
        "{} v{} ({})",
        env::args().next().unwrap_or_else(|| "cellhalo".to_string()),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_NAME")
    );
    info!(
        "Called with command line: {}",
        env::args().collect::<Vec<_>>().join(" ")
    );
}

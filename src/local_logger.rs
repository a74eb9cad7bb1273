use std::{
    env,
    io::Write,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::prelude::*;
use console::{Style, style};
use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use log::Log;
use simplelog::{CombinedLogger, SharedLogger};

use crate::logger::{GroupEvent, get_group_event};

pub const DOCTOR_U8_COLOR_CODE: u8 = 38; // #00AFD7
pub const LOG_LEVEL_ENV: &str = "PERF_DOCTOR_LOG";

/// The phase opened by the last `start_group!`.
struct ActiveGroup {
    name: String,
    started: Instant,
    /// Only drawn on a TTY, and cleared as soon as a child process takes over the terminal
    spinner: Option<ProgressBar>,
}

lazy_static! {
    static ref GROUP: Mutex<Option<ActiveGroup>> = Mutex::new(None);
    pub static ref IS_TTY: bool = std::io::IsTerminal::is_terminal(&std::io::stdout());
}

fn new_spinner(name: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template(&format!(
        "  {{spinner:>.{DOCTOR_U8_COLOR_CODE}}} {{wide_msg:.{DOCTOR_U8_COLOR_CODE}.bold}}"
    )) {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(format!("{name}..."));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Hide the spinner while `f` runs, so its output is not drawn over.
pub fn suspend_progress_bar<F: FnOnce() -> R, R>(f: F) -> R {
    if let Ok(group) = GROUP.lock() {
        if let Some(spinner) = group.as_ref().and_then(|group| group.spinner.as_ref()) {
            return spinner.suspend(f);
        }
    }

    f()
}

pub fn get_log_level() -> log::LevelFilter {
    env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|log_level| log_level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info)
}

fn start_group(name: String) {
    println!(
        "\n{}",
        style(format!("►►► {name} "))
            .bold()
            .color256(DOCTOR_U8_COLOR_CODE)
    );

    let spinner = if *IS_TTY {
        Some(new_spinner(&name))
    } else {
        println!("{name}...");
        None
    };

    if let Ok(mut group) = GROUP.lock() {
        if let Some(spinner) = group.take().and_then(|previous| previous.spinner) {
            spinner.finish_and_clear();
        }
        *group = Some(ActiveGroup {
            name,
            started: Instant::now(),
            spinner,
        });
    }
}

fn end_group() {
    let Some(group) = GROUP.lock().ok().and_then(|mut group| group.take()) else {
        return;
    };
    if let Some(spinner) = group.spinner {
        spinner.finish_and_clear();
    }
    println!(
        "{}",
        style(format!(
            "✔ {} ({:.2?})",
            group.name,
            group.started.elapsed()
        ))
        .dim()
    );
}

pub struct LocalLogger {
    log_level: log::LevelFilter,
}

impl LocalLogger {
    pub fn new() -> Self {
        LocalLogger {
            log_level: get_log_level(),
        }
    }
}

impl Log for LocalLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.log_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match get_group_event(record) {
            Some(GroupEvent::Start(name)) => start_group(name),
            Some(GroupEvent::End) => end_group(),
            None => suspend_progress_bar(|| print_record(record)),
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Print a log record to the console with the appropriate style
fn print_record(record: &log::Record) {
    let error_style = Style::new().red();
    let info_style = Style::new().white();
    let warn_style = Style::new().yellow();
    let debug_style = Style::new().blue().dim();
    let trace_style = Style::new().black().dim();

    match record.level() {
        log::Level::Error => eprintln!("{}", error_style.apply_to(record.args())),
        log::Level::Warn => eprintln!("{}", warn_style.apply_to(record.args())),
        log::Level::Info => println!("{}", info_style.apply_to(record.args())),
        log::Level::Debug => println!(
            "{}",
            debug_style.apply_to(format!("[DEBUG::{}] {}", record.target(), record.args())),
        ),
        log::Level::Trace => println!(
            "{}",
            trace_style.apply_to(format!("[TRACE::{}] {}", record.target(), record.args()))
        ),
    }
}

impl SharedLogger for LocalLogger {
    fn level(&self) -> log::LevelFilter {
        self.log_level
    }

    fn config(&self) -> Option<&simplelog::Config> {
        None
    }

    fn as_log(self: Box<Self>) -> Box<dyn Log> {
        Box::new(*self)
    }
}

pub fn init_local_logger() -> Result<()> {
    CombinedLogger::init(vec![Box::new(LocalLogger::new())])?;
    Ok(())
}

/// Clear the group spinner, if any, so a child process can own the terminal.
///
/// The group itself stays open and still reports its duration when it ends.
pub fn clean_logger() {
    if let Ok(mut group) = GROUP.lock() {
        if let Some(spinner) = group.as_mut().and_then(|group| group.spinner.take()) {
            spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_env() {
        temp_env::with_var(LOG_LEVEL_ENV, Some("debug"), || {
            assert_eq!(get_log_level(), log::LevelFilter::Debug);
        });
        temp_env::with_var(LOG_LEVEL_ENV, Some("verbose"), || {
            assert_eq!(get_log_level(), log::LevelFilter::Info);
        });
        temp_env::with_var(LOG_LEVEL_ENV, None::<&str>, || {
            assert_eq!(get_log_level(), log::LevelFilter::Info);
        });
    }
}

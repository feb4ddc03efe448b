use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use brewjvm::{GeneralError, Runtime, StateConfig};
use brewjvm_base::{
    print::{write_class, PrintError},
    ClassFile,
};
use brewjvm_class_loaders::{load_from_file, ClassDirectories, LoadClassFileError};
use clap::{ArgEnum, Parser};
use tracing_subscriber::layer::SubscriberExt;

mod formatter;

pub const BREW_LOG_CONSOLE: &str = "BREW_LOG_CONSOLE";
pub const BREW_LOG_FILE: &str = "BREW_LOG_FILE";
pub const LOG_FILE_PATH: &str = "./brew.log";

#[derive(Debug, Parser)]
#[clap(name = "BrewJVM")]
#[clap(version = "0.1.0")]
#[clap(about = "Parses class files and interprets a subset of their bytecode")]
struct CliArgs {
    /// A class file, or a directory holding class files
    #[clap(long, parse(from_os_str), value_name = "PATH")]
    class_path: PathBuf,
    #[clap(long, arg_enum, default_value = "run")]
    mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ArgEnum)]
enum Mode {
    /// Execute the entry point
    Run,
    /// Print the structure of each class
    Print,
}

#[derive(Debug)]
enum FrontendError {
    ClassPath(std::io::Error),
    Load(LoadClassFileError),
    Print(PrintError),
    General(GeneralError),
}
impl From<LoadClassFileError> for FrontendError {
    fn from(err: LoadClassFileError) -> Self {
        Self::Load(err)
    }
}
impl From<PrintError> for FrontendError {
    fn from(err: PrintError) -> Self {
        Self::Print(err)
    }
}
impl From<GeneralError> for FrontendError {
    fn from(err: GeneralError) -> Self {
        Self::General(err)
    }
}

struct EmptyWriter;
impl std::io::Write for EmptyWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn make_log_file() -> std::io::Result<std::sync::Arc<std::fs::File>> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(LOG_FILE_PATH)?;
    Ok(std::sync::Arc::new(log_file))
}

fn init_logging(conf: &StateConfig) {
    let should_log_console = std::env::var(BREW_LOG_CONSOLE)
        .map(|x| x != "0")
        .unwrap_or(true);
    let should_log_file = std::env::var(BREW_LOG_FILE)
        .map(|x| x == "1")
        .unwrap_or(false);

    let console_layer = if should_log_console {
        Some(
            tracing_subscriber::fmt::Layer::default()
                .with_writer(std::io::stderr)
                .without_time()
                .event_format(formatter::Formatter),
        )
    } else {
        None
    };

    let (log_file, log_file_err) = if should_log_file {
        match make_log_file() {
            Ok(file) => (Some(file), None),
            Err(err) => (None, Some(err)),
        }
    } else {
        (None, None)
    };
    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::Layer::default()
            .with_writer(file)
            .without_time()
            .event_format(formatter::Formatter)
    });

    let t_subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(conf.tracing_level)
        .without_time()
        .event_format(formatter::Formatter)
        .with_writer(|| EmptyWriter)
        .finish()
        .with(console_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(t_subscriber)
        .expect("failed to set global default tracing subscriber");

    if let Some(err) = log_file_err {
        tracing::warn!("Failed to open log file {}: {:?}", LOG_FILE_PATH, err);
    }
}

fn main() -> ExitCode {
    // Clap exits on its own for a missing class path or an invalid mode
    let args = CliArgs::parse();

    let conf = StateConfig::new();
    init_logging(&conf);

    tracing::info!("BrewJVM Initializing");

    match execute(&args, conf) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:?}", err);
            ExitCode::from(1)
        }
    }
}

fn execute(args: &CliArgs, conf: StateConfig) -> Result<(), FrontendError> {
    let class_files = load_class_path(&args.class_path)?;

    match args.mode {
        Mode::Print => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for class_file in &class_files {
                write_class(&mut out, class_file)?;
            }
        }
        Mode::Run => {
            let mut runtime = Runtime::new(conf);
            for class_file in class_files {
                runtime.register(class_file)?;
            }

            match runtime.run()? {
                Some(value) => tracing::info!("Entry point returned a value: {:?}", value),
                None => tracing::info!("Entry point returned"),
            }
        }
    }

    Ok(())
}

/// Load the single class file, or every class file directly inside the directory
fn load_class_path(path: &Path) -> Result<Vec<ClassFile>, FrontendError> {
    if path.is_dir() {
        let mut class_directories = ClassDirectories::default();
        class_directories
            .add(path)
            .map_err(FrontendError::ClassPath)?;
        let class_files = class_directories.load_all()?;
        tracing::info!(
            "Loaded {} class files from {}",
            class_files.len(),
            path.display()
        );
        Ok(class_files)
    } else {
        Ok(vec![load_from_file(path)?])
    }
}

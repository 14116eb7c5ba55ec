use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FILTER_VARIABLE: &str = "HTMLDECK_LOG";
const DEFAULT_FILTER: &str = "info";

/// Where log events are written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogTarget {
    Disabled,
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// Picks the target for a run.
    ///
    /// Interactive sessions own the terminal so they only log into files. An explicit log file
    /// always wins over the configured one.
    pub fn select(headless: bool, cli_file: Option<&Path>, config_file: Option<&Path>) -> Self {
        match cli_file.or(config_file) {
            Some(path) => Self::File(path.to_path_buf()),
            None if headless => Self::Stderr,
            None => Self::Disabled,
        }
    }
}

/// Installs the global subscriber.
///
/// The filter is taken from `HTMLDECK_LOG` and defaults to `info`.
pub fn init_logging(target: LogTarget) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_env(FILTER_VARIABLE).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    match &target {
        LogTarget::Disabled => return Ok(()),
        LogTarget::Stderr => {
            let layer = fmt::layer().with_writer(io::stderr).with_target(false);
            tracing_subscriber::registry().with(filter).with(layer).try_init()?;
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| LoggingError::Open(path.clone(), e))?;
            let layer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
            tracing_subscriber::registry().with(filter).with(layer).try_init()?;
        }
    };
    tracing::debug!("logging initialized: {target:?}");
    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("opening log file {0:?}: {1}")]
    Open(PathBuf, io::Error),

    #[error("installing subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::interactive(false, None, None, LogTarget::Disabled)]
    #[case::headless(true, None, None, LogTarget::Stderr)]
    #[case::configured(false, None, Some("config.log"), LogTarget::File("config.log".into()))]
    #[case::explicit(true, Some("cli.log"), Some("config.log"), LogTarget::File("cli.log".into()))]
    fn target_selection(
        #[case] headless: bool,
        #[case] cli_file: Option<&str>,
        #[case] config_file: Option<&str>,
        #[case] expected: LogTarget,
    ) {
        let target = LogTarget::select(headless, cli_file.map(Path::new), config_file.map(Path::new));
        assert_eq!(target, expected);
    }

    #[test]
    fn unwritable_log_file() {
        let dir = tempfile::tempdir().expect("no temp dir");
        let path = dir.path().join("missing").join("htmldeck.log");
        let result = init_logging(LogTarget::File(path));
        assert!(matches!(result, Err(LoggingError::Open(..))), "{result:?}");
    }
}

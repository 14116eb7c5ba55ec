use itertools::Itertools;
use std::{
    io::{self, Write},
    process::{Child, Command, Output, Stdio},
    thread::{self, sleep},
    time::{Duration, Instant},
};

const DEFAULT_MAX_ERROR_LINES: usize = 10;
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub(crate) struct ThirdPartyTools;

impl ThirdPartyTools {
    /// The tool that takes screenshots of HTML documents.
    pub(crate) fn rasterizer(command: &str, args: &[&str]) -> Tool {
        Tool::new(command, args)
    }

    /// Runs a tool with `--version`, which tells whether it's installed.
    pub(crate) fn version_check(command: &str) -> Tool {
        Tool::new(command, &["--version"])
    }

    /// The tool that turns HTML documents into PDFs.
    pub(crate) fn document_generator(command: &str, args: &[&str]) -> Tool {
        Tool::new(command, args).max_error_lines(100)
    }
}

pub(crate) struct Tool {
    command_name: String,
    command: Command,
    stdin: Option<Vec<u8>>,
    max_error_lines: usize,
    timeout: Option<Duration>,
}

impl Tool {
    fn new(command_name: &str, args: &[&str]) -> Self {
        let mut command = Command::new(command_name);
        command.args(args).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped());
        Self {
            command_name: command_name.to_string(),
            command,
            stdin: None,
            max_error_lines: DEFAULT_MAX_ERROR_LINES,
            timeout: None,
        }
    }

    pub(crate) fn stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = Some(stdin);
        self
    }

    pub(crate) fn max_error_lines(mut self, value: usize) -> Self {
        self.max_error_lines = value;
        self
    }

    /// Kill the tool if it runs for longer than this.
    pub(crate) fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn run(self) -> Result<(), ExecutionError> {
        self.spawn()?;
        Ok(())
    }

    pub(crate) fn run_and_capture_stdout(mut self) -> Result<Vec<u8>, ExecutionError> {
        self.command.stdout(Stdio::piped());

        let output = self.spawn()?;
        Ok(output.stdout)
    }

    fn spawn(mut self) -> Result<Output, ExecutionError> {
        use ExecutionError::*;
        if self.stdin.is_some() {
            self.command.stdin(Stdio::piped());
        }
        let command = self.command_name.clone();
        let mut child = match self.command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(SpawnNotFound { command }),
            Err(error) => return Err(Spawn { command, error }),
        };
        // the deadline covers feeding the input too
        let deadline = self.timeout.map(|timeout| (Instant::now() + timeout, timeout));
        let writer = match (self.stdin.take(), child.stdin.take()) {
            (Some(data), Some(mut stdin)) => {
                Some(thread::spawn(move || stdin.write_all(&data).and_then(|_| stdin.flush())))
            }
            _ => None,
        };
        if let Some((deadline, timeout)) = deadline {
            Self::wait_until(&mut child, deadline).map_err(|error| match error {
                WaitError::TimedOut => TimedOut { command: command.clone(), timeout },
                WaitError::Io(error) => Communication { command: command.clone(), error },
            })?;
        }
        let output = child.wait_with_output().map_err(|error| Communication { command: command.clone(), error })?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => (),
                // tools may exit without reading their input, their exit status tells what happened
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => (),
                Ok(Err(error)) => return Err(Communication { command, error }),
                Err(_) => return Err(Communication { command, error: io::Error::other("stdin writer panicked") }),
            }
        }
        self.validate_output(&output)?;
        Ok(output)
    }

    fn wait_until(child: &mut Child, deadline: Instant) -> Result<(), WaitError> {
        loop {
            if child.try_wait()?.is_some() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                // the process may have exited in between so don't care if this fails
                let _ = child.kill();
                let _ = child.wait();
                return Err(WaitError::TimedOut);
            }
            sleep(WAIT_POLL_INTERVAL);
        }
    }

    fn validate_output(self, output: &Output) -> Result<(), ExecutionError> {
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).lines().take(self.max_error_lines).join("\n");
            Err(ExecutionError::Execution { command: self.command_name, stderr })
        }
    }
}

enum WaitError {
    TimedOut,
    Io(io::Error),
}

impl From<io::Error> for WaitError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("spawning '{command}' failed: {error}")]
    Spawn { command: String, error: io::Error },

    #[error("spawning '{command}' failed (is '{command}' installed?)")]
    SpawnNotFound { command: String },

    #[error("communicating with '{command}' failed: {error}")]
    Communication { command: String, error: io::Error },

    #[error("'{command}' execution failed: \n{stderr}")]
    Execution { command: String, stderr: String },

    #[error("'{command}' did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    #[test]
    fn capture_stdout() {
        let output = Tool::new("echo", &["hello"]).run_and_capture_stdout().expect("run failed");
        assert_eq!(output, b"hello\n");
    }

    #[test]
    fn stdin_is_forwarded() {
        let output = Tool::new("cat", &[]).stdin(b"hi".to_vec()).run_and_capture_stdout().expect("run failed");
        assert_eq!(output, b"hi");
    }

    #[test]
    fn missing_tool() {
        let result = Tool::new("this-tool-does-not-exist-anywhere", &[]).run();
        assert!(matches!(result, Err(ExecutionError::SpawnNotFound { .. })), "{result:?}");
    }

    #[test]
    fn failing_tool() {
        let result = Tool::new("sh", &["-c", "echo oops >&2; exit 1"]).run();
        let Err(ExecutionError::Execution { stderr, .. }) = result else {
            panic!("unexpected result: {result:?}");
        };
        assert_eq!(stderr, "oops");
    }

    #[test]
    fn timeout_covers_unread_input() {
        let started = Instant::now();
        let result = Tool::new("sleep", &["3"]).stdin(vec![b'x'; 1 << 20]).timeout(Duration::from_millis(100)).run();
        assert!(matches!(result, Err(ExecutionError::TimedOut { .. })), "{result:?}");
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    }

    #[test]
    fn timeout_kills_tool() {
        let result = Tool::new("sleep", &["5"]).timeout(Duration::from_millis(100)).run();
        assert!(matches!(result, Err(ExecutionError::TimedOut { .. })), "{result:?}");
    }
}

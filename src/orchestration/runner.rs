//! External command execution
//!
//! Every docker and aws invocation goes through [`CommandRunner`] so the
//! release sequence can be exercised without spawning real processes.

use crate::error::{ReleaseError, ReleaseResult};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Receives each output line of a child process
pub type OutputSink = Arc<dyn Fn(String) + Send + Sync>;

/// Runs external commands, failing on a non-zero exit status
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command with its output forwarded
    async fn run(&self, program: &str, args: &[String]) -> ReleaseResult<()>;

    /// Run a command, writing `input` to its standard input
    async fn run_with_input(&self, input: &str, program: &str, args: &[String])
        -> ReleaseResult<()>;

    /// Run a command and return its standard output
    async fn run_with_output(&self, program: &str, args: &[String]) -> ReleaseResult<String>;
}

/// Command runner backed by `tokio::process`
///
/// Output is inherited from this process unless a sink is set, in which
/// case stdout and stderr are piped and delivered line by line.
#[derive(Clone, Default)]
pub struct ExecCommandRunner {
    sink: Option<OutputSink>,
}

impl ExecCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver child output to `sink` instead of this process's streams
    pub fn with_output_sink(sink: OutputSink) -> Self {
        Self { sink: Some(sink) }
    }

    fn command(&self, program: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if self.sink.is_some() {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        cmd
    }

    async fn wait(&self, mut child: Child, command_line: &str) -> ReleaseResult<()> {
        if let Some(sink) = &self.sink {
            stream_child_output(&mut child, sink.as_ref()).await;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ReleaseError::command_failed(command_line, e))?;

        check_status(command_line, status)
    }
}

#[async_trait]
impl CommandRunner for ExecCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> ReleaseResult<()> {
        let command_line = display_command(program, args);
        debug!("Executing: {}", command_line);

        let child = self
            .command(program, args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| ReleaseError::command_failed(&command_line, e))?;

        self.wait(child, &command_line).await
    }

    async fn run_with_input(
        &self,
        input: &str,
        program: &str,
        args: &[String],
    ) -> ReleaseResult<()> {
        let command_line = display_command(program, args);
        debug!("Executing with input: {}", command_line);

        let mut child = self
            .command(program, args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| ReleaseError::command_failed(&command_line, e))?;

        // The writer closes stdin when it finishes so the child sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            let input = input.to_string();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    warn!("Failed to write command input: {}", e);
                }
            });
        }

        self.wait(child, &command_line).await
    }

    async fn run_with_output(&self, program: &str, args: &[String]) -> ReleaseResult<String> {
        let command_line = display_command(program, args);
        debug!("Executing for output: {}", command_line);

        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null()).stdout(Stdio::piped());
        if self.sink.is_some() {
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stderr(Stdio::inherit());
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| ReleaseError::command_failed(&command_line, e))?;

        if let Some(sink) = &self.sink {
            for line in String::from_utf8_lossy(&output.stderr).lines() {
                sink(line.to_string());
            }
        }

        check_status(&command_line, output.status)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Render a command line the way an operator would type it
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_status(command_line: &str, status: ExitStatus) -> ReleaseResult<()> {
    if status.success() {
        Ok(())
    } else {
        Err(ReleaseError::CommandStatus {
            command: command_line.to_string(),
            code: status.code().unwrap_or(-1),
        })
    }
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Lines are decoded lossily; both pipes are drained until EOF so the child
/// never blocks on a full pipe.
async fn stream_child_output(child: &mut Child, on_output: &(dyn Fn(String) + Send + Sync)) {
    let mut stdout_reader = child.stdout.take().map(BufReader::new);
    let mut stderr_reader = child.stderr.take().map(BufReader::new);
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let mut stdout_done = stdout_reader.is_none();
    let mut stderr_done = stderr_reader.is_none();

    while !stdout_done || !stderr_done {
        tokio::select! {
            line = async { read_line_lossy(stdout_reader.as_mut()?, &mut stdout_buf).await }, if !stdout_done => {
                match line {
                    Some(line) => on_output(line),
                    None => stdout_done = true,
                }
            }
            line = async { read_line_lossy(stderr_reader.as_mut()?, &mut stderr_buf).await }, if !stderr_done => {
                match line {
                    Some(line) => on_output(line),
                    None => stderr_done = true,
                }
            }
        }
    }
}

/// Read one line, replacing invalid UTF-8; `None` at EOF or on a read error
///
/// `buf` carries partially read bytes across a cancelled read and must be
/// kept between calls.
async fn read_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    match reader.read_until(b'\n', buf).await {
        Ok(0) if buf.is_empty() => None,
        Ok(_) => {
            let mut end = buf.len();
            if buf[..end].ends_with(b"\n") {
                end -= 1;
            }
            if buf[..end].ends_with(b"\r") {
                end -= 1;
            }
            let line = String::from_utf8_lossy(&buf[..end]).into_owned();
            buf.clear();
            Some(line)
        }
        Err(e) => {
            warn!("Failed to read command output: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn capturing_runner() -> (ExecCommandRunner, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let sink: OutputSink = Arc::new(move |line| captured.lock().unwrap().push(line));
        (ExecCommandRunner::with_output_sink(sink), lines)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn display_command_joins_args() {
        assert_eq!(
            display_command("docker", &args(&["push", "repo:tag"])),
            "docker push repo:tag"
        );
    }

    #[tokio::test]
    async fn run_streams_stdout_and_stderr() {
        let (runner, lines) = capturing_runner();
        runner
            .run("/bin/sh", &args(&["-c", "echo out; echo err >&2"]))
            .await
            .unwrap();

        let lines = lines.lock().unwrap();
        assert!(lines.contains(&"out".to_string()));
        assert!(lines.contains(&"err".to_string()));
    }

    #[tokio::test]
    async fn run_with_input_pipes_stdin() {
        let (runner, lines) = capturing_runner();
        runner
            .run_with_input(
                "test-input",
                "/bin/sh",
                &args(&["-c", "input=$(cat); echo \"out: $input\"; echo \"err: $input\" >&2"]),
            )
            .await
            .unwrap();

        let lines = lines.lock().unwrap();
        assert!(lines.contains(&"out: test-input".to_string()));
        assert!(lines.contains(&"err: test-input".to_string()));
    }

    #[tokio::test]
    async fn run_with_output_captures_stdout() {
        let (runner, lines) = capturing_runner();
        let output = runner
            .run_with_output("/bin/sh", &args(&["-c", "echo out: test-output; echo err >&2"]))
            .await
            .unwrap();

        assert_eq!(output, "out: test-output\n");
        assert_eq!(*lines.lock().unwrap(), vec!["err".to_string()]);
    }

    #[tokio::test]
    async fn invalid_utf8_output_keeps_draining() {
        let (runner, lines) = capturing_runner();
        let script = "printf 'Step caf\\351\\n'; head -c 200000 /dev/zero | tr '\\0' a; echo; echo done >&2";

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            runner.run("/bin/sh", &args(&["-c", script])),
        )
        .await
        .expect("command output was not drained");
        result.unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(lines[0], "Step caf\u{FFFD}");
        assert!(lines.iter().any(|line| line.len() == 200_000));
        assert!(lines.contains(&"done".to_string()));
    }

    #[tokio::test]
    async fn final_line_without_newline_is_delivered() {
        let (runner, lines) = capturing_runner();
        runner
            .run("/bin/sh", &args(&["-c", "printf 'first\\r\\nlast'"]))
            .await
            .unwrap();

        assert_eq!(*lines.lock().unwrap(), vec!["first".to_string(), "last".to_string()]);
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let (runner, _) = capturing_runner();
        let err = runner
            .run("/bin/sh", &args(&["-c", "exit 3"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::CommandStatus { code: 3, .. }));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let runner = ExecCommandRunner::new();
        let err = runner
            .run("definitely-not-a-real-program-7f3a", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::CommandFailed { .. }));
    }
}

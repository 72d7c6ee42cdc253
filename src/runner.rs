use crate::error::{RasterError, Result};
use crate::sanitize::LineCollapser;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const LINE_BUFFER: usize = 256;
const DRAIN_GRACE: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(20);
pub const MAX_LINE: usize = 4096;

/// A program invocation: argv plus extra environment. Arguments are handed to
/// the OS as-is; no shell ever sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: OsString,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
}

impl CommandLine {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Builds from an argv prefix such as `["gm", "convert"]`.
    pub fn from_prefix(prefix: &[String]) -> Self {
        let mut parts = prefix.iter();
        let mut cmd = Self::new(parts.next().map(String::as_str).unwrap_or_default());
        cmd.args(parts);
        cmd
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for a in args {
            self.arg(a);
        }
        self
    }

    pub fn env(&mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> &mut Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_env(&self, key: &str) -> Option<&OsStr> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }

    /// Shell-quoted rendering for logs and error payloads.
    pub fn display(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.env {
            out.push_str(&k.to_string_lossy());
            out.push('=');
            out.push_str(&shell_quote(&v.to_string_lossy()));
            out.push(' ');
        }
        out.push_str(&shell_quote(&self.program.to_string_lossy()));
        for a in &self.args {
            out.push(' ');
            out.push_str(&shell_quote(&a.to_string_lossy()));
        }
        out
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }
}

pub fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+%@".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

pub trait ProcessRunner {
    /// Runs `cmd` to completion or until `timeout` elapses, returning the
    /// sanitized combined stdout/stderr on a zero exit status.
    fn run(&self, cmd: &CommandLine, timeout: Duration) -> Result<String>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for &T {
    fn run(&self, cmd: &CommandLine, timeout: Duration) -> Result<String> {
        (**self).run(cmd, timeout)
    }
}

#[derive(Debug, Clone)]
pub struct SystemRunner {
    max_output_lines: usize,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl SystemRunner {
    pub fn new(max_output_lines: usize) -> Self {
        Self { max_output_lines }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, cmd: &CommandLine, timeout: Duration) -> Result<String> {
        let shown = cmd.display();
        debug!("exec {shown} timeout={:?}", timeout);

        let mut command = cmd.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut command);

        let mut child = command.spawn().map_err(|source| RasterError::Spawn {
            command: shown.clone(),
            source,
        })?;

        let (tx, rx) = crossbeam_channel::bounded::<String>(LINE_BUFFER);
        if let Some(out) = child.stdout.take() {
            spawn_reader(out, tx.clone());
        }
        if let Some(err) = child.stderr.take() {
            spawn_reader(err, tx.clone());
        }
        drop(tx);

        let deadline = Instant::now() + timeout;
        let mut output = LineCollapser::with_limit(self.max_output_lines);

        let Some(status) = self.wait_for_exit(&mut child, &rx, &mut output, deadline)? else {
            warn!("killing process group after {:?}: {shown}", timeout);
            kill_process_group(&mut child);
            let _ = child.wait();
            drain(&rx, &mut output);
            return Err(RasterError::Timeout {
                command: shown,
                timeout,
                output: output.finish(),
            });
        };

        // the tool is done; anything it left running in its group goes too
        kill_process_group(&mut child);
        drain(&rx, &mut output);

        let text = output.finish();
        if status.success() {
            Ok(text)
        } else {
            debug!("exit {status}: {shown}");
            Err(RasterError::ExtractionFailed {
                command: shown,
                output: text,
            })
        }
    }
}

impl SystemRunner {
    /// Collects output until the child exits or the deadline passes. The exit
    /// status is polled between lines, so a background process holding the
    /// pipes open cannot stall a finished tool.
    fn wait_for_exit(
        &self,
        child: &mut Child,
        rx: &Receiver<String>,
        output: &mut LineCollapser,
        deadline: Instant,
    ) -> Result<Option<ExitStatus>> {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            match rx.recv_deadline((now + POLL).min(deadline)) {
                Ok(line) => output.push(&line),
                Err(RecvTimeoutError::Disconnected) => return wait_until(child, deadline),
                Err(RecvTimeoutError::Timeout) => {}
            }
            if let Some(status) = child
                .try_wait()
                .map_err(|e| RasterError::io("try_wait", e))?
            {
                return Ok(Some(status));
            }
        }
    }
}

/// Forwards output line by line. `\r` also ends a line, and a line longer
/// than `MAX_LINE` bytes is cut there with the remainder discarded, so a
/// stream without newlines never grows the buffer.
fn spawn_reader<R: Read + Send + 'static>(stream: R, tx: Sender<String>) {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut line: Vec<u8> = Vec::with_capacity(256);
        let mut overlong = false;
        loop {
            let (consumed, complete) = match reader.fill_buf() {
                Ok([]) | Err(_) => break,
                Ok(chunk) => {
                    let end = chunk.iter().position(|b| *b == b'\n' || *b == b'\r');
                    let piece = &chunk[..end.unwrap_or(chunk.len())];
                    if !overlong {
                        let room = MAX_LINE - line.len();
                        line.extend_from_slice(&piece[..piece.len().min(room)]);
                    }
                    (end.map_or(chunk.len(), |i| i + 1), end.is_some())
                }
            };
            reader.consume(consumed);

            if !overlong && line.len() >= MAX_LINE {
                if !send_line(&tx, &mut line) {
                    return;
                }
                overlong = true;
            }
            if complete {
                if !overlong && !send_line(&tx, &mut line) {
                    return;
                }
                line.clear();
                overlong = false;
            }
        }
        if !overlong && !line.is_empty() {
            send_line(&tx, &mut line);
        }
    });
}

fn send_line(tx: &Sender<String>, line: &mut Vec<u8>) -> bool {
    let text = String::from_utf8_lossy(line).into_owned();
    line.clear();
    tx.send(text).is_ok()
}

fn wait_until(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| RasterError::io("try_wait", e))?
        {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn drain(rx: &Receiver<String>, output: &mut LineCollapser) {
    let until = Instant::now() + DRAIN_GRACE;
    while let Ok(line) = rx.recv_deadline(until) {
        output.push(&line);
    }
}

#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // negative pid targets the whole group the child leads
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

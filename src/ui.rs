//! Operator narration
//!
//! CI logs are the only window operators have into a release, so every
//! step and every forwarded command line is written to stderr before it
//! runs. This output is independent of the tracing filter.

use console::style;
use std::io::Write;
use std::sync::Mutex;

/// Writes progress narration to a diagnostic stream
pub struct Narrator {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Narrator {
    /// Narrate to this process's stderr
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }

    /// Announce a step, e.g. `- Building docker image...`
    pub fn step(&self, message: &str) {
        self.write(&format!("{} {}\n\n", style("-").for_stderr().cyan(), message));
    }

    /// Echo a command line exactly as it is forwarded
    pub fn command(&self, program: &str, args: &[String]) {
        self.write(&format!("$ {} {}\n\n", program, args.join(" ")));
    }

    /// Print a multi-line notice
    pub fn notice(&self, lines: &[&str]) {
        let mut text = lines.join("\n");
        text.push_str("\n\n");
        self.write(&text);
    }

    fn write(&self, text: &str) {
        // Write errors are ignored.
        if let Ok(mut out) = self.out.lock() {
            out.write_all(text.as_bytes()).ok();
            out.flush().ok();
        }
    }
}

/// In-memory narration target for tests
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Narrator writing into a buffer the test can inspect
#[cfg(test)]
pub(crate) fn captured() -> (Narrator, SharedBuffer) {
    let buffer = SharedBuffer::default();
    (Narrator::new(buffer.clone()), buffer)
}

// Terminal input: a plain echoing line reader for the username and a masked
// reader for the password. Both are generic over their byte source and sink
// so they can be driven from memory in tests; `TerminalPrompt` wires them to
// stdin/stdout.

use std::io::{self, BufRead, Read, Write};

use tracing::warn;

use crate::error::{Error, Result};

const CTRL_C: u8 = 3;
const BACKSPACE: u8 = 8;
const DELETE: u8 = 127;
const MASK: &[u8] = b"*";
const ERASE: &[u8] = b"\x08 \x08";

/// Switches the terminal in and out of raw (non-canonical, non-echoing) mode.
pub trait RawMode {
    fn enable(&mut self) -> io::Result<()>;
    fn disable(&mut self) -> io::Result<()>;
}

/// Raw mode of the controlling terminal, handled by crossterm. Disabling
/// restores the mode that was active before `enable`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermRawMode;

impl RawMode for CrosstermRawMode {
    fn enable(&mut self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()
    }

    fn disable(&mut self) -> io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }
}

/// Keeps the terminal in raw mode while alive and restores it on drop, on
/// every exit path.
pub struct RawModeGuard<'a, M: RawMode> {
    mode: &'a mut M,
}

impl<'a, M: RawMode> RawModeGuard<'a, M> {
    pub fn acquire(mode: &'a mut M) -> io::Result<Self> {
        mode.enable()?;
        Ok(RawModeGuard { mode })
    }
}

impl<M: RawMode> Drop for RawModeGuard<'_, M> {
    fn drop(&mut self) {
        if let Err(err) = self.mode.disable() {
            warn!(error = %err, "failed to restore terminal mode");
        }
    }
}

/// Reads a line without echoing it, printing a mask character per accepted
/// byte instead.
pub struct SecureLineReader<R, W, M> {
    input: R,
    output: W,
    mode: M,
}

impl<R: Read, W: Write, M: RawMode> SecureLineReader<R, W, M> {
    pub fn new(input: R, output: W, mode: M) -> Self {
        SecureLineReader {
            input,
            output,
            mode,
        }
    }

    /// Show `prompt`, then collect printable ASCII until carriage return or
    /// newline. Ctrl-C aborts with `Error::Interrupted` and discards what was
    /// typed; backspace and delete remove the last character.
    pub fn read_masked(&mut self, prompt: &str) -> Result<String> {
        let SecureLineReader {
            input,
            output,
            mode,
        } = self;
        write_prompt(output, prompt)?;

        let _raw = RawModeGuard::acquire(mode).map_err(Error::Input)?;
        let mut buffer = Vec::new();
        loop {
            let byte = match read_byte(input)? {
                Some(byte) => byte,
                None => {
                    return Err(Error::Input(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "input closed before end of line",
                    )))
                }
            };

            match byte {
                b'\r' | b'\n' => {
                    echo(output, b"\r\n");
                    // Only bytes in 32..=126 are ever pushed.
                    return Ok(buffer.into_iter().map(char::from).collect());
                }
                CTRL_C => return Err(Error::Interrupted),
                BACKSPACE | DELETE => {
                    if buffer.pop().is_some() {
                        echo(output, ERASE);
                    }
                }
                32..=126 => {
                    buffer.push(byte);
                    echo(output, MASK);
                }
                _ => {}
            }
        }
    }
}

/// Reads one echoed line, the terminal stays in its normal mode.
pub struct LineReader<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LineReader<R, W> {
    pub fn new(input: R, output: W) -> Self {
        LineReader { input, output }
    }

    /// Show `prompt` and return the next line with surrounding whitespace
    /// trimmed. End of input before any byte is an error.
    pub fn read_line(&mut self, prompt: &str) -> Result<String> {
        write_prompt(&mut self.output, prompt)?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(Error::Input)?;
        if read == 0 {
            return Err(Error::Input(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no input available",
            )));
        }
        Ok(line.trim().to_string())
    }
}

/// Source of interactive answers for the login flow.
pub trait Prompt {
    fn read_line(&mut self, prompt: &str) -> Result<String>;
    fn read_masked(&mut self, prompt: &str) -> Result<String>;
}

/// `Prompt` backed by the process's stdin/stdout and controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        LineReader::new(io::stdin().lock(), io::stdout()).read_line(prompt)
    }

    fn read_masked(&mut self, prompt: &str) -> Result<String> {
        SecureLineReader::new(io::stdin().lock(), io::stdout(), CrosstermRawMode).read_masked(prompt)
    }
}

fn write_prompt<W: Write>(output: &mut W, prompt: &str) -> Result<()> {
    output
        .write_all(prompt.as_bytes())
        .and_then(|_| output.flush())
        .map_err(|source| Error::io("write prompt to", "stdout", source))
}

// Echo failures are cosmetic and must not abort the read.
fn echo<W: Write>(output: &mut W, bytes: &[u8]) {
    let _ = output.write_all(bytes).and_then(|_| output.flush());
}

fn read_byte<R: Read>(input: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match input.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::Input(err)),
        }
    }
}

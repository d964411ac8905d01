//! Interactive console session.
//!
//! A three-state loop: prompt for a line, dispatch the command it names,
//! stop on `quit` or end of input. Command parsing is a pure function so it
//! can be tested without any I/O.

use emoface_core::{console_report, EmotionBackend, Outcome};
use emoface_intake::{load_image, AllowList, IntakeError, UploadStore};
use std::io::{self, BufRead, Write};

const PROMPT: &str = "Enter image filename (or 'list', 'quit'): ";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    List,
    Blank,
    Analyze(String),
}

/// Classify one input line. Keywords are case-insensitive; anything else is
/// a filename, kept as typed apart from surrounding whitespace.
pub fn classify(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Blank;
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "quit" | "exit" | "q" => Command::Quit,
        "list" => Command::List,
        _ => Command::Analyze(trimmed.to_string()),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum State {
    Prompting,
    Dispatching(Command),
    Terminated,
}

/// Console session over arbitrary input and output streams.
pub struct Session<'a, B: ?Sized, R, W> {
    backend: &'a mut B,
    store: &'a UploadStore,
    input: R,
    output: W,
}

impl<'a, B, R, W> Session<'a, B, R, W>
where
    B: EmotionBackend + ?Sized,
    R: BufRead,
    W: Write,
{
    pub fn new(backend: &'a mut B, store: &'a UploadStore, input: R, output: W) -> Self {
        Self {
            backend,
            store,
            input,
            output,
        }
    }

    /// Run until `quit` or end of input.
    pub fn run(&mut self) -> io::Result<()> {
        writeln!(self.output, "😀 emoface — facial emotion detector")?;
        writeln!(self.output, "Images are read from {}", self.store.root().display())?;

        let mut state = State::Prompting;
        loop {
            state = match state {
                State::Prompting => self.prompt()?,
                State::Dispatching(command) => self.dispatch(command)?,
                State::Terminated => break,
            };
        }
        Ok(())
    }

    fn prompt(&mut self) -> io::Result<State> {
        write!(self.output, "\n{PROMPT}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(State::Terminated);
        }
        Ok(State::Dispatching(classify(&line)))
    }

    fn dispatch(&mut self, command: Command) -> io::Result<State> {
        tracing::debug!(?command, "dispatching");
        match command {
            Command::Quit => {
                writeln!(self.output, "👋 Goodbye!")?;
                return Ok(State::Terminated);
            }
            Command::Blank => {}
            Command::List => list_images(self.store, &mut self.output)?,
            Command::Analyze(name) => {
                analyze_file(self.backend, self.store, &name, &mut self.output)?;
            }
        }
        Ok(State::Prompting)
    }
}

/// Print the readable images in the uploads directory.
pub fn list_images<W: Write>(store: &UploadStore, out: &mut W) -> io::Result<()> {
    match store.list(&AllowList::READABLE) {
        Ok(names) if names.is_empty() => {
            writeln!(out, "No images found in {}", store.root().display())
        }
        Ok(names) => {
            writeln!(out, "📁 Images in {}:", store.root().display())?;
            for name in names {
                writeln!(out, "  - {name}")?;
            }
            Ok(())
        }
        Err(e) => writeln!(out, "Error: {e}"),
    }
}

/// Analyse one file and print its report or a diagnostic. Returns whether a
/// mood was detected.
pub fn analyze_file<B, W>(
    backend: &mut B,
    store: &UploadStore,
    name: &str,
    out: &mut W,
) -> io::Result<bool>
where
    B: EmotionBackend + ?Sized,
    W: Write,
{
    if !AllowList::READABLE.permits(name) {
        writeln!(
            out,
            "Error: Unsupported file type '{name}' (expected one of: {})",
            AllowList::READABLE.extensions().join(", ")
        )?;
        return Ok(false);
    }

    let path = store.resolve(name);
    let image = match load_image(&path) {
        Ok(image) => image,
        Err(IntakeError::NotFound(_)) => {
            writeln!(out, "Error: File '{name}' not found")?;
            writeln!(out, "Type 'list' to see images in {}", store.root().display())?;
            return Ok(false);
        }
        Err(IntakeError::Decode { reason, .. }) => {
            writeln!(out, "Error: Could not read image '{}': {reason}", path.display())?;
            return Ok(false);
        }
        Err(e) => {
            writeln!(out, "Error: {e}")?;
            return Ok(false);
        }
    };

    writeln!(out, "🔍 Analyzing {}...", path.display())?;
    match emoface_core::analyze(backend, &image) {
        Outcome::Detected { result } => {
            write!(out, "\n{}", console_report(&result))?;
            Ok(true)
        }
        other => {
            writeln!(out, "{}", other.mood_text())?;
            Ok(false)
        }
    }
}

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use log::info;

use crate::ast::ExprId;
use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// An interpreter session: one set of globals shared across every `run`
/// call, plus the error flags the batch driver turns into exit codes.
///
/// Any scan, parse, or resolve error sets `had_error` and suppresses
/// evaluation of that source.  A runtime error sets `had_runtime_error` and
/// abandons the rest of the statement list; in the REPL it does not end the
/// session.
pub struct Lox {
    interpreter: Interpreter,
    next_id: ExprId,
    had_error: bool,
    had_runtime_error: bool,
}

impl Lox {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }

    pub fn with_interpreter(interpreter: Interpreter) -> Self {
        Lox {
            interpreter,
            next_id: 0,
            had_error: false,
            had_runtime_error: false,
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Batch mode: execute one file to completion.
    pub fn run_file(&mut self, path: &Path) -> Result<()> {
        info!("Running file {}", path.display());

        let mut buf: Vec<u8> = Vec::new();
        let mut reader = BufReader::new(File::open(path)?);
        reader.read_to_end(&mut buf)?;

        let source = String::from_utf8(buf)?;
        self.run(&source);

        Ok(())
    }

    /// Interactive mode: read a line, execute it, clear the static-error
    /// flag, repeat until EOF.
    pub fn run_prompt(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut line = String::new();

        loop {
            stdout.write_all(b"> ")?;
            stdout.flush()?;

            line.clear();

            if stdin.read_line(&mut line)? == 0 {
                break;
            }

            self.run(&line);

            // A bad line must not poison the next one.
            self.had_error = false;
        }

        Ok(())
    }

    /// The full pipeline over one source text: scan, parse, resolve,
    /// interpret.  Front-end errors go to stderr as they accumulate; any of
    /// them suppresses evaluation.
    pub fn run(&mut self, source: &str) {
        let mut tokens = Vec::new();

        for item in Scanner::new(source.as_bytes()) {
            match item {
                Ok(token) => tokens.push(token),

                Err(e) => {
                    eprintln!("{}", e);
                    self.had_error = true;
                }
            }
        }

        let mut parser = Parser::with_start_id(tokens, self.next_id);
        let (statements, parse_errors) = parser.parse();

        // Ids must stay unique across successive REPL lines: a stale id
        // reused by a later parse would clobber the recorded depth of a node
        // inside a still-live closure.
        self.next_id = parser.next_id();

        for e in parse_errors {
            eprintln!("{}", e);
            self.had_error = true;
        }

        if self.had_error {
            return;
        }

        let resolver = Resolver::new(&mut self.interpreter);

        for e in resolver.resolve(&statements) {
            eprintln!("{}", e);
            self.had_error = true;
        }

        if self.had_error {
            return;
        }

        if let Err(e) = self.interpreter.interpret(&statements) {
            eprintln!("{}", e);
            self.had_runtime_error = true;
        }
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

//! # CLI - lsmkv interactive shell
//!
//! A REPL-style command-line interface for the lsmkv storage engine.
//! Reads commands from stdin, executes them against the engine, and prints
//! results to stdout. Logs go to stderr, so the shell can be scripted by
//! piping commands in and reading stdout.
//!
//! ## Commands
//!
//! ```text
//! SET key value      Insert or update a key (the value may contain spaces)
//! GET key            Look up a key (prints the value or "(nil)")
//! FLUSH              Write the memtable to a new segment
//! KEYS               List the keys buffered in the memtable
//! STATS              Print engine statistics
//! HELP               Show this list
//! EXIT / QUIT        Close the engine and leave
//! ```
//!
//! ## Configuration
//!
//! Settings come from `LSMKV_DB_DIR`, `LSMKV_CAPACITY`, `LSMKV_SPARSITY`,
//! `LSMKV_WAL_SYNC` and `LSMKV_BLOOM_FPR` (see the `config` crate). Log
//! verbosity is controlled by `RUST_LOG` (default `warn`).
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! lsmkv started (db_dir=lsm_db, capacity=100, sparsity=10, segments=0, memtable=0)
//! > SET name Alice Smith
//! OK
//! > GET name
//! Alice Smith
//! > EXIT
//! bye
//! ```

use anyhow::Result;
use config::EngineConfig;
use engine::Engine;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
Commands:
  SET key value   Insert or update a key (value may contain spaces)
  GET key         Look up a key
  FLUSH           Write the memtable to a new segment
  KEYS            List keys in the memtable
  STATS           Show engine statistics
  HELP            Show this help
  EXIT | QUIT     Close the engine and leave";

/// Whether the REPL keeps reading after a command.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Exit,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = EngineConfig::from_env()?;
    let mut engine = Engine::open(config)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    run(&mut engine, stdin.lock(), &mut stdout.lock())?;
    Ok(())
}

/// Runs the REPL until EXIT/QUIT or end of input. The engine is closed on
/// the way out either way.
fn run<R: BufRead, W: Write>(engine: &mut Engine, input: R, out: &mut W) -> Result<()> {
    let cfg = engine.config();
    writeln!(
        out,
        "lsmkv started (db_dir={}, capacity={}, sparsity={}, segments={}, memtable={})",
        cfg.db_dir.display(),
        cfg.capacity,
        cfg.sparsity,
        engine.segment_count(),
        engine.memtable_len()
    )?;
    writeln!(out, "Type HELP for commands.")?;
    prompt(out)?;

    let mut exited = false;
    for line in input.lines() {
        let line = line?;
        if execute(engine, &line, out)? == Step::Exit {
            exited = true;
            break;
        }
        prompt(out)?;
    }

    // End of input behaves like EXIT.
    if !exited {
        writeln!(out)?;
        exit(engine, out)?;
    }
    Ok(())
}

fn prompt<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "> ")?;
    out.flush()
}

/// Executes one input line.
fn execute<W: Write>(engine: &mut Engine, line: &str, out: &mut W) -> io::Result<Step> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Step::Continue);
    }
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim_start()),
        None => (line, ""),
    };

    match cmd.to_uppercase().as_str() {
        "SET" => {
            // Everything after the key is the value, inner spaces included.
            match rest.split_once(char::is_whitespace) {
                Some((key, value)) if !value.trim().is_empty() => {
                    match engine.set(key.as_bytes().to_vec(), value.trim_start().as_bytes().to_vec()) {
                        Ok(()) => writeln!(out, "OK")?,
                        Err(e) => writeln!(out, "ERR set failed: {}", e)?,
                    }
                }
                _ => writeln!(out, "ERR usage: SET key value")?,
            }
        }
        "GET" => match rest.split_whitespace().next() {
            Some(key) => match engine.get(key.as_bytes()) {
                Ok(Some(v)) => writeln!(out, "{}", String::from_utf8_lossy(&v))?,
                Ok(None) => writeln!(out, "(nil)")?,
                Err(e) => writeln!(out, "ERR read failed: {}", e)?,
            },
            None => writeln!(out, "ERR usage: GET key")?,
        },
        "FLUSH" => match engine.flush() {
            Ok(()) => writeln!(out, "OK (segments={})", engine.segment_count())?,
            Err(e) => writeln!(out, "ERR flush failed: {}", e)?,
        },
        "KEYS" => match engine.keys() {
            Ok(keys) if keys.is_empty() => writeln!(out, "(empty memtable)")?,
            Ok(keys) => {
                for key in &keys {
                    writeln!(out, "{}", String::from_utf8_lossy(key))?;
                }
                writeln!(out, "({} keys)", keys.len())?;
            }
            Err(e) => writeln!(out, "ERR keys failed: {}", e)?,
        },
        "STATS" => match engine.stats() {
            Ok(stats) => {
                writeln!(out, "memtable entries: {}", stats.memtable_count)?;
                writeln!(out, "segments:         {}", stats.segment_count)?;
                writeln!(out, "capacity:         {}", stats.capacity)?;
                writeln!(out, "db folder:        {}", stats.db_dir.display())?;
                for seg in &stats.segments {
                    writeln!(out, "  - segment {} ({} bytes)", seg.id, seg.data_bytes)?;
                }
            }
            Err(e) => writeln!(out, "ERR stats failed: {}", e)?,
        },
        "HELP" => writeln!(out, "{}", HELP)?,
        "EXIT" | "QUIT" => {
            exit(engine, out)?;
            return Ok(Step::Exit);
        }
        other => writeln!(out, "ERR unknown command: {} (type HELP)", other)?,
    }
    Ok(Step::Continue)
}

fn exit<W: Write>(engine: &mut Engine, out: &mut W) -> io::Result<()> {
    if let Err(e) = engine.close() {
        writeln!(out, "ERR close failed: {}", e)?;
    }
    writeln!(out, "bye")
}

#[cfg(test)]
mod tests;

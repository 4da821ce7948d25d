//! JSON Lines input and output helpers

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use stylometer::Sample;

/// Path that stands for stdin/stdout
const STDIO: &str = "-";

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == STDIO {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Writer for `-o` (stdout when absent or `-`)
pub fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if p.as_os_str() != STDIO => {
            let file = File::create(p).with_context(|| format!("creating {}", p.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

/// Parse one JSON value per non-blank line.
pub fn read_json_lines<T: DeserializeOwned>(reader: impl BufRead, source: &str) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", source))?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid JSON record", source, n + 1))?;
        items.push(item);
    }
    Ok(items)
}

pub fn read_samples(path: &Path) -> Result<Vec<Sample>> {
    read_json_lines(open_input(path)?, &path.display().to_string())
}

pub fn write_json_lines<T: Serialize>(out: &mut dyn Write, items: &[T]) -> Result<()> {
    for item in items {
        serde_json::to_writer(&mut *out, item)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

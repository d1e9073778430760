//! Decode command implementation.

use super::render_event;
use clusterfeed_protocol::decode_line;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// A record that failed to decode.
#[derive(Debug, Serialize)]
pub struct DecodeFailure {
    /// 1-based line number.
    pub line: usize,
    /// Decoder error message.
    pub error: String,
}

/// Decode results.
#[derive(Debug, Default, Serialize)]
pub struct DecodeReport {
    /// Non-blank lines read.
    pub records: usize,
    /// Lines that decoded to an event.
    pub decoded: usize,
    /// Lines that did not.
    pub failures: Vec<DecodeFailure>,
}

/// Runs the decode command.
pub fn run(input: Option<&Path>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = match input {
        Some(path) => decode_records(BufReader::new(File::open(path)?), format)?,
        None => decode_records(io::stdin().lock(), format)?,
    };

    match format {
        "json" => eprintln!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            for failure in &report.failures {
                eprintln!("line {}: {}", failure.line, failure.error);
            }
            eprintln!(
                "{} records, {} decoded, {} failed",
                report.records,
                report.decoded,
                report.failures.len()
            );
        }
    }

    if report.failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} records failed to decode", report.failures.len()).into())
    }
}

/// Decodes every line of `reader`, printing events to stdout.
pub fn decode_records<R: BufRead>(
    reader: R,
    format: &str,
) -> Result<DecodeReport, Box<dyn std::error::Error>> {
    let mut report = DecodeReport::default();

    for (idx, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        report.records += 1;

        match decode_line(&line) {
            Ok(event) => {
                println!("{}", render_event(&event, format)?);
                report.decoded += 1;
            }
            Err(err) => report.failures.push(DecodeFailure {
                line: idx + 1,
                error: err.to_string(),
            }),
        }
    }

    Ok(report)
}

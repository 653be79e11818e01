//! Reading and writing sample batches as JSON.

use std::io::{Read, Write};
use std::path::Path;

use crate::error::{CaptureError, Result};
use crate::sample::QuerySample;

/// Parses a JSON array of samples.
pub fn parse_samples(json: &str) -> Result<Vec<QuerySample>> {
    serde_json::from_str(json).map_err(|e| CaptureError::io(format!("Invalid sample batch: {e}")))
}

/// Reads a batch from `source`; `-` reads standard input.
pub fn read_samples(source: &str) -> Result<Vec<QuerySample>> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CaptureError::io(format!("Failed to read stdin: {e}")))?;
        buf
    } else {
        std::fs::read_to_string(source)
            .map_err(|e| CaptureError::io(format!("Failed to read {source}: {e}")))?
    };

    parse_samples(&content)
}

/// Serializes a batch as JSON.
pub fn render_samples(samples: &[QuerySample], pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(samples)
    } else {
        serde_json::to_string(samples)
    };
    rendered.map_err(|e| CaptureError::internal(format!("Failed to serialize samples: {e}")))
}

/// Writes a batch to `target`, or to standard output when `None`.
pub fn write_samples(target: Option<&Path>, samples: &[QuerySample], pretty: bool) -> Result<()> {
    let mut rendered = render_samples(samples, pretty)?;
    rendered.push('\n');

    match target {
        Some(path) => std::fs::write(path, rendered)
            .map_err(|e| CaptureError::io(format!("Failed to write {}: {e}", path.display()))),
        None => std::io::stdout()
            .lock()
            .write_all(rendered.as_bytes())
            .map_err(|e| CaptureError::io(format!("Failed to write stdout: {e}"))),
    }
}

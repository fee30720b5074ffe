use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::engine::ExtractionReport;

/// One JSON report per line. Replaces any existing file.
pub fn write_jsonl(path: &Path, items: &[&ExtractionReport]) -> anyhow::Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    for it in items {
        let line = serde_json::to_string(it)?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
    }
    f.flush()?;
    Ok(())
}

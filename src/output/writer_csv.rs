use csv::Writer;
use std::fs::File;
use std::path::Path;

use crate::engine::ExtractionReport;
use crate::features::Feature;

/// Dataset-compatible CSV: `url` followed by every schema column.
pub fn write_csv(path: &Path, items: &[&ExtractionReport]) -> anyhow::Result<()> {
    let f = File::create(path)?;
    let mut w = Writer::from_writer(f);
    let mut header = vec!["url"];
    header.extend(Feature::ALL.iter().map(|f| f.name()));
    w.write_record(&header)?;
    for it in items {
        let mut record = vec![it.url.clone()];
        record.extend(it.features.to_i8_vec().iter().map(|v| v.to_string()));
        w.write_record(&record)?;
    }
    w.flush()?;
    Ok(())
}

/*!
 * Export of provider result sets
 *
 * JSON output uses the same `{ "physicians": [...] }` envelope the directory
 * endpoint serves, so an export can be fed back in as a file source. CSV
 * output has one column per key seen in any exported record.
 */

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::data_types::ProviderRecord;
use crate::dataset::ProviderDataset;
use crate::{ExportFormat, Result};

/// Writes a set of provider records to a file
pub trait ResultExporter {
    /// Export the records
    fn export(&self, records: &[ProviderRecord], path: &Path) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;
}

#[derive(Serialize)]
struct Envelope<'a> {
    physicians: &'a [ProviderRecord],
}

/// JSON exporter
pub struct JsonExporter {
    /// Whether to pretty-print the JSON
    pub pretty_print: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self { pretty_print: true }
    }
}

impl JsonExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }
}

impl ResultExporter for JsonExporter {
    fn export(&self, records: &[ProviderRecord], path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        let envelope = Envelope { physicians: records };

        if self.pretty_print {
            serde_json::to_writer_pretty(&mut writer, &envelope)?;
        } else {
            serde_json::to_writer(&mut writer, &envelope)?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), records = records.len(), "exported JSON");
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }
}

/// CSV exporter with a union-of-keys header
pub struct CsvExporter {
    /// Whether to include the header row
    pub include_headers: bool,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
        }
    }
}

impl CsvExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }
}

/// Every key present in any record, sorted
pub fn column_names(records: &[ProviderRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(|record| record.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl ResultExporter for CsvExporter {
    fn export(&self, records: &[ProviderRecord], path: &Path) -> Result<()> {
        let columns = column_names(records);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(File::create(path)?);

        if self.include_headers {
            writer.write_record(&columns)?;
        }

        for record in records {
            let row: Vec<String> = columns
                .iter()
                .map(|column| {
                    record
                        .get(column)
                        .map(|value| value.as_text().into_owned())
                        .unwrap_or_default()
                })
                .collect();
            writer.write_record(&row)?;
        }
        writer.flush()?;

        tracing::info!(
            path = %path.display(),
            records = records.len(),
            columns = columns.len(),
            "exported CSV"
        );
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// Export records in the given format with default exporter settings
pub fn export_records<P: AsRef<Path>>(
    records: &[ProviderRecord],
    path: P,
    format: ExportFormat,
) -> Result<()> {
    match format {
        ExportFormat::Json => JsonExporter::default().export(records, path.as_ref()),
        ExportFormat::Csv => CsvExporter::default().export(records, path.as_ref()),
    }
}

// Export convenience functions for ProviderDataset
impl ProviderDataset {
    /// Export every record as a JSON envelope
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        JsonExporter::default().export(self.records(), path.as_ref())
    }

    /// Export every record as CSV
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        CsvExporter::default().export(self.records(), path.as_ref())
    }

    /// Export the records matching `filter`
    pub fn export_subset<P: AsRef<Path>, F>(&self, path: P, filter: F, format: ExportFormat) -> Result<()>
    where
        F: Fn(&ProviderRecord) -> bool,
    {
        let subset: Vec<ProviderRecord> = self
            .records()
            .iter()
            .filter(|record| filter(record))
            .cloned()
            .collect();
        export_records(&subset, path, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ProviderReader;

    fn records() -> Vec<ProviderRecord> {
        vec![
            ProviderRecord::new()
                .with("Name", "Dr. A")
                .with("Specialty", "Cardiology")
                .with("Latitude", 29.7604),
            ProviderRecord::new()
                .with("Name", "Dr. B, Jr.")
                .with("LanguagesSpoken", "English"),
        ]
    }

    #[test]
    fn test_column_names_are_union_of_keys() {
        assert_eq!(
            column_names(&records()),
            ["LanguagesSpoken", "Latitude", "Name", "Specialty"]
        );
        assert!(column_names(&[]).is_empty());
    }

    #[test]
    fn test_json_export_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("providers.json");

        JsonExporter::new().with_pretty_print(false).export(&records(), &path).unwrap();

        let loaded = ProviderReader::new().load_file(&path).unwrap();
        assert_eq!(loaded, records());
    }

    #[test]
    fn test_csv_export_fills_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("providers.csv");

        CsvExporter::new().export(&records(), &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 4);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "");
        assert_eq!(&rows[0][1], "29.7604");
        assert_eq!(&rows[1][2], "Dr. B, Jr.");
    }

    #[test]
    fn test_dataset_export_subset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardiology.json");
        let dataset = ProviderDataset::from_raw(&records());

        dataset
            .export_subset(
                &path,
                |r| r.primary_specialty().is_some(),
                ExportFormat::Json,
            )
            .unwrap();

        let loaded = ProviderReader::new().load_file(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].display_name(), "Dr. A");
    }
}

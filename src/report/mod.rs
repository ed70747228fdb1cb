// Append-only JSONL trail of every parsed transaction, whether or not
// it traded. One object per line, flushed per row so the file is
// tailable while the bot runs.

use crate::models::ParsedTransaction;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct JsonlReporter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl JsonlReporter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening report file {}", path.display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn record(&mut self, tx: &ParsedTransaction) -> Result<()> {
        serde_json::to_writer(&mut self.writer, tx)
            .with_context(|| format!("writing report row to {}", self.path.display()))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn tx(asset: &str) -> ParsedTransaction {
        ParsedTransaction {
            amount: 1_000_000.0,
            asset: asset.to_string(),
            usd_value: Some(450_000.0),
            from_entity: "unknown wallet".to_string(),
            to_entity: "Binance".to_string(),
            raw_text: format!("1,000,000 #{asset} transferred"),
            timestamp_text: None,
            timestamp: None,
            source_link: None,
        }
    }

    #[test]
    fn rows_append_one_json_object_per_line() {
        let path = std::env::temp_dir().join(format!("report-{}.jsonl", Uuid::new_v4()));

        {
            let mut reporter = JsonlReporter::open(&path).unwrap();
            reporter.record(&tx("XRP")).unwrap();
            reporter.record(&tx("DOGE")).unwrap();
        }
        // reopening appends rather than truncating
        {
            let mut reporter = JsonlReporter::open(&path).unwrap();
            reporter.record(&tx("SOL")).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<ParsedTransaction> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].asset, "XRP");
        assert_eq!(rows[2].asset, "SOL");

        std::fs::remove_file(&path).ok();
    }
}

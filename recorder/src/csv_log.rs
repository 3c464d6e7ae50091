use anyhow::Context;
use chrono::Local;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use rigdaq::Sample;

/// Every decoded record, one CSV row each, behind a `time` + channel names header.
pub struct CsvLog {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl CsvLog {
    pub fn default_file_name() -> String {
        Local::now().format("data_%Y-%m-%d,%H-%M-%S.csv").to_string()
    }

    pub fn create(dir: &Path, file_name: Option<&str>, channels: &[String]) -> anyhow::Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Error creating \"{}\"", dir.display()))?;

        let path = match file_name {
            Some(name) => dir.join(name),
            None => dir.join(Self::default_file_name()),
        };
        let mut writer =
            csv::Writer::from_path(&path).with_context(|| format!("Error creating \"{}\"", path.display()))?;

        let header = std::iter::once("time").chain(channels.iter().map(String::as_str));
        writer.write_record(header).context("Error writing the CSV header")?;
        writer.flush().context("CSV error")?;

        Ok(CsvLog { writer, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, sample: &Sample) -> anyhow::Result<()> {
        let mut row = Vec::with_capacity(sample.values.len() + 1);
        row.push(sample.timestamp.to_string());
        row.extend(sample.values.iter().map(f32::to_string));

        self.writer.write_record(&row).context("Error writing a CSV row")?;
        // rows are flushed as they come so a killed recorder loses nothing
        self.writer.flush().context("CSV error")?;
        Ok(())
    }
}

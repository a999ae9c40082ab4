use crate::prelude::*;

use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;

/// Appends records to a file, one JSON object per line.
#[derive(Debug)]
pub struct DatalogWriter {
    file: std::fs::File,
    path: String,
    records_written: u64,
}

impl DatalogWriter {
    pub fn new(path: &str) -> Result<Self> {
        info!("Opening datalog file at {}", path);

        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to open datalog file {}: {}", path, e);
                return Err(e.into());
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)) {
                error!("Failed to set permissions on datalog file {}: {}", path, e);
                return Err(e.into());
            }
        }

        Ok(Self {
            file,
            path: path.to_string(),
            records_written: 0,
        })
    }

    pub fn write_reading(&mut self, reading: &Reading) -> Result<()> {
        self.write_record(reading)
    }

    pub fn write_identity(&mut self, identity: &Identity) -> Result<()> {
        self.write_record(identity)
    }

    fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let json_string = serde_json::to_string(record)?;

        if let Err(e) = writeln!(self.file, "{}", json_string).and_then(|_| self.file.flush()) {
            error!("Failed to write to datalog file {}: {}", self.path, e);
            return Err(e.into());
        }

        self.records_written += 1;
        debug!("Total records stored in {}: {}", self.path, self.records_written);

        Ok(())
    }
}

//! TOML-backed float store.
//!
//! Every write serializes the whole table to a temp file and renames it over
//! the live one, so a crash mid-write leaves either the old state or the new
//! state, never a torn file. The table is small (a few dozen keys) so the
//! full rewrite per store is cheap.

use crate::error::HwError;
use reef_traits::FloatStore;
use std::path::PathBuf;

pub struct TomlStore {
    path: PathBuf,
    table: toml::Table,
}

impl TomlStore {
    /// Open or create the state file. A missing file starts empty; a file
    /// that no longer parses is an error rather than silent data loss.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HwError> {
        let path = path.into();
        let table = match std::fs::read_to_string(&path) {
            Ok(s) => s
                .parse::<toml::Table>()
                .map_err(|e| HwError::Corrupt(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(HwError::Io(e)),
        };
        Ok(Self { path, table })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn flush(&self) -> Result<(), HwError> {
        let text =
            toml::to_string(&self.table).map_err(|e| HwError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl FloatStore for TomlStore {
    fn load(
        &mut self,
        key: &str,
    ) -> std::result::Result<Option<f32>, Box<dyn std::error::Error + Send + Sync>> {
        let v = self.table.get(key).and_then(toml::Value::as_float);
        Ok(v.map(|f| f as f32))
    }

    fn store(
        &mut self,
        key: &str,
        value: f32,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.table
            .insert(key.to_string(), toml::Value::Float(f64::from(value)));
        self.flush()?;
        Ok(())
    }
}

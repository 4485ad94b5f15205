use std::{fs, io, path::Path};

use rand::seq::SliceRandom;

use crate::Result;

/// Static message pool for channels that post without reading.
///
/// The file is read once at startup: one candidate message per non-empty
/// line. The two fallback lines mirror what gets posted when the pool is
/// unusable, so a misconfigured channel stays visibly alive.
pub struct MessagePool {
    lines: Vec<String>,
    missing: bool,
}

impl MessagePool {
    /// A missing file is remembered and reported through the fallback
    /// line; any other read failure is a startup error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Self {
                lines: contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect(),
                missing: false,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self {
                lines: Vec::new(),
                missing: true,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn random_line(&self) -> String {
        if self.missing {
            return "File pesan.txt tidak ditemukan!".to_string();
        }
        match self.lines.choose(&mut rand::thread_rng()) {
            Some(line) => line.clone(),
            None => "Tidak ada pesan tersedia di file.".to_string(),
        }
    }
}

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::RecordId;
use crate::error::GrabError;

/// Local layout of downloaded record files: one flat directory, each
/// file named identically to its remote filename.
#[derive(Debug, Clone)]
pub struct Store {
    samples_root: Utf8PathBuf,
}

impl Store {
    pub fn new(samples_root: Utf8PathBuf) -> Self {
        Self { samples_root }
    }

    pub fn samples_root(&self) -> &Utf8Path {
        &self.samples_root
    }

    pub fn ensure_samples_root(&self) -> Result<(), GrabError> {
        fs::create_dir_all(self.samples_root.as_std_path())
            .map_err(|err| GrabError::Filesystem(err.to_string()))
    }

    pub fn file_path(&self, filename: &str) -> Utf8PathBuf {
        self.samples_root.join(filename)
    }

    pub fn header_path(&self, id: &RecordId) -> Utf8PathBuf {
        self.samples_root.join(format!("{id}.hea"))
    }

    pub fn record_exists(&self, id: &RecordId) -> bool {
        self.header_path(id).as_std_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = Store::new(Utf8PathBuf::from("samples"));
        let id: RecordId = "a40439n".parse().unwrap();

        assert_eq!(store.file_path("a40439n.dat"), "samples/a40439n.dat");
        assert_eq!(store.header_path(&id), "samples/a40439n.hea");
    }
}

use crate::error::FetchError;
use crate::model::RawDocument;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Where documents come from, by identifier.
pub trait DocumentSource: Send + Sync {
    fn fetch(&self, id: u32) -> Result<RawDocument, FetchError>;
}

/// Documents saved in a local directory as `<id>.pdf` or `<id>.txt`
/// (already-extracted text).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySource { dir: dir.into() }
    }
}

impl DocumentSource for DirectorySource {
    fn fetch(&self, id: u32) -> Result<RawDocument, FetchError> {
        for ext in ["pdf", "txt"] {
            let path = self.dir.join(format!("{id}.{ext}"));
            match std::fs::read(&path) {
                Ok(bytes) => return Ok(RawDocument { id, bytes }),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => return Err(FetchError::Timeout { id }),
                Err(e) => {
                    return Err(FetchError::Network {
                        id,
                        reason: format!("{}: {e}", path.display()),
                    })
                }
            }
        }
        Err(FetchError::NotFound { id })
    }
}

/// Documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: BTreeMap<u32, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, id: u32, bytes: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(id, bytes.into());
        self
    }
}

impl DocumentSource for MemorySource {
    fn fetch(&self, id: u32) -> Result<RawDocument, FetchError> {
        self.documents
            .get(&id)
            .map(|bytes| RawDocument {
                id,
                bytes: bytes.clone(),
            })
            .ok_or(FetchError::NotFound { id })
    }
}

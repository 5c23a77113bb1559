//! In-memory artifacts. The core never touches the filesystem; the host
//! decides where (and whether) a bundle lands on disk.

use serde::Serialize;

use crate::codegen::Target;

/// One named unit of generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Base name without extension (already sanitized for the target).
    pub name: String,
    pub content: String,
    /// Extension including the dot (`.c`, `.vhd`).
    pub extension: String,
    pub target: Target,
}

impl Artifact {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        extension: impl Into<String>,
        target: Target,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            extension: extension.into(),
            target,
        }
    }

    /// Suggested file name, e.g. `traffic_light.vhd`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }

    pub fn byte_len(&self) -> usize {
        self.content.len()
    }
}

/// An ordered collection of artifacts from one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Bundle {
    artifacts: Vec<Artifact>,
}

/// Packs artifacts into a bundle, preserving their order.
pub fn bundle(artifacts: Vec<Artifact>) -> Bundle {
    Bundle { artifacts }
}

impl Bundle {
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Looks an artifact up by its suggested file name.
    pub fn get(&self, file_name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.file_name() == file_name)
    }

    pub fn total_bytes(&self) -> usize {
        self.artifacts.iter().map(Artifact::byte_len).sum()
    }
}

impl IntoIterator for Bundle {
    type Item = Artifact;
    type IntoIter = std::vec::IntoIter<Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.into_iter()
    }
}

//! Filesystem-backed storage containers and the files inside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A container: one directory directly beneath the storage root.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Container {
    pub name: String,

    /// Size reported by the filesystem for the directory entry.
    pub size: u64,

    pub atime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
}

/// A regular file stored in a container.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileInfo {
    /// Name of the owning container.
    pub container: String,

    pub name: String,

    /// Payload length in bytes.
    pub size: u64,

    pub atime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
}

/// Summary of one file part accepted by an upload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UploadedFile {
    pub container: String,
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
}

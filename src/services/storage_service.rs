//! src/services/storage_service.rs
//!
//! StorageService: filesystem-backed containers. Each container is a
//! directory directly beneath `base_path`; each file is a regular file inside
//! it. There is no metadata database: the directory tree is the source of
//! truth.

use crate::models::container::{Container, FileInfo, UploadedFile};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, future::join_all, pin_mut};
use std::{
    fs::Metadata,
    io::{self, ErrorKind},
    path::PathBuf,
    time::SystemTime,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("container `{0}` not found")]
    ContainerNotFound(String),
    #[error("container `{0}` already exists")]
    ContainerAlreadyExists(String),
    #[error("file `{name}` not found in container `{container}`")]
    FileNotFound { container: String, name: String },
    #[error("name `{name}` invalid: {reason}")]
    InvalidName { name: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// The two container operations bulk deletion is built from.
#[async_trait]
pub trait ContainerStore: Send + Sync {
    async fn list_containers(&self) -> StorageResult<Vec<Container>>;
    async fn destroy_container(&self, name: &str) -> StorageResult<()>;
}

/// Delete every container `store` currently lists.
///
/// A listing failure is returned unchanged before any deletion starts.
/// Otherwise all deletions run concurrently and each one runs to completion;
/// the first failure in listing order is returned.
pub async fn destroy_all_containers<S>(store: &S) -> StorageResult<()>
where
    S: ContainerStore + ?Sized,
{
    let containers = store.list_containers().await?;
    let count = containers.len();

    let results = join_all(
        containers
            .iter()
            .map(|container| store.destroy_container(&container.name)),
    )
    .await;

    let mut first_error = None;
    for (container, result) in containers.iter().zip(results) {
        if let Err(err) = result {
            warn!("failed to destroy container {}: {}", container.name, err);
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => {
            info!("destroyed {} container(s)", count);
            Ok(())
        }
    }
}

/// StorageService provides container and file operations:
/// - Create, list, inspect and destroy containers (directories)
/// - Upload a file (streams to a temp file, then renames into place)
/// - List, inspect, download and remove files
#[derive(Clone)]
pub struct StorageService {
    /// Root directory; every container is a child directory of it.
    pub base_path: PathBuf,
}

const MAX_NAME_LEN: usize = 255;
const TMP_PREFIX: &str = ".tmp-";

impl StorageService {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Container and file names become single path components, so anything
    /// that could escape the directory is rejected.
    fn ensure_name_safe(name: &str) -> StorageResult<()> {
        let invalid = |reason: &str| StorageError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        };

        if name.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(invalid("must be at most 255 bytes"));
        }
        if name == "." || name == ".." {
            return Err(invalid("must not be a relative path component"));
        }
        if name.starts_with(TMP_PREFIX) {
            return Err(invalid("prefix is reserved for in-flight uploads"));
        }
        if name
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control())
        {
            return Err(invalid("must not contain slashes or control characters"));
        }
        Ok(())
    }

    fn container_path(&self, container: &str) -> PathBuf {
        self.base_path.join(container)
    }

    fn file_path(&self, container: &str, name: &str) -> PathBuf {
        self.container_path(container).join(name)
    }

    /// Metadata of an existing container directory.
    async fn container_metadata(&self, name: &str) -> StorageResult<Metadata> {
        Self::ensure_name_safe(name)?;
        match fs::metadata(self.container_path(name)).await {
            Ok(meta) if meta.is_dir() => Ok(meta),
            Ok(_) => Err(StorageError::ContainerNotFound(name.to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::ContainerNotFound(name.to_string()))
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Create an empty container.
    pub async fn create_container(&self, name: &str) -> StorageResult<Container> {
        Self::ensure_name_safe(name)?;
        let path = self.container_path(name);
        match fs::create_dir(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::ContainerAlreadyExists(name.to_string()));
            }
            Err(err) => return Err(StorageError::Io(err)),
        }
        debug!("created container directory {}", path.display());
        self.get_container(name).await
    }

    pub async fn get_container(&self, name: &str) -> StorageResult<Container> {
        let meta = self.container_metadata(name).await?;
        Ok(container_from(name.to_string(), &meta))
    }

    /// Files in a container, sorted by name. In-flight uploads are hidden.
    pub async fn list_files(&self, container: &str) -> StorageResult<Vec<FileInfo>> {
        self.container_metadata(container).await?;

        let mut entries = fs::read_dir(self.container_path(container)).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(TMP_PREFIX) {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() {
                files.push(file_from(container, name, &meta));
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    pub async fn get_file(&self, container: &str, name: &str) -> StorageResult<FileInfo> {
        let (info, _) = self.stat_file(container, name).await?;
        Ok(info)
    }

    async fn stat_file(&self, container: &str, name: &str) -> StorageResult<(FileInfo, PathBuf)> {
        Self::ensure_name_safe(name)?;
        self.container_metadata(container).await?;

        let path = self.file_path(container, name);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok((file_from(container, name.to_string(), &meta), path)),
            Ok(_) => Err(self.file_not_found(container, name)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(self.file_not_found(container, name)),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn file_not_found(&self, container: &str, name: &str) -> StorageError {
        StorageError::FileNotFound {
            container: container.to_string(),
            name: name.to_string(),
        }
    }

    /// Stream-upload a file into a container.
    ///
    /// - Writes bytes incrementally to a temporary file in the container.
    /// - Counts the size while streaming.
    /// - Syncs, then renames over any existing file of the same name.
    ///
    /// The temporary file is removed on every error path.
    pub async fn upload_file_stream<S>(
        &self,
        container: &str,
        name: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<UploadedFile>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        Self::ensure_name_safe(name)?;
        self.container_metadata(container).await?;

        let file_path = self.file_path(container, name);
        let tmp_path = self
            .container_path(container)
            .join(format!("{}{}", TMP_PREFIX, Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        debug!("stored {} bytes at {}", size, file_path.display());
        Ok(UploadedFile {
            container: container.to_string(),
            name: name.to_string(),
            content_type: content_type.unwrap_or_else(|| "application/octet-stream".into()),
            size,
        })
    }

    /// Open a file for streaming out, together with its metadata.
    pub async fn open_file(&self, container: &str, name: &str) -> StorageResult<(FileInfo, File)> {
        let (info, path) = self.stat_file(container, name).await?;
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                self.file_not_found(container, name)
            } else {
                StorageError::Io(err)
            }
        })?;
        Ok((info, file))
    }

    pub async fn remove_file(&self, container: &str, name: &str) -> StorageResult<()> {
        let (_, path) = self.stat_file(container, name).await?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("removed file {}", path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(self.file_not_found(container, name)),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Delete every container. See [`destroy_all_containers`].
    pub async fn destroy_all(&self) -> StorageResult<()> {
        destroy_all_containers(self).await
    }
}

#[async_trait]
impl ContainerStore for StorageService {
    /// Containers sorted by name. Fails if the storage root is unreadable.
    async fn list_containers(&self) -> StorageResult<Vec<Container>> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut containers = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            // Leftover temp dirs and other unaddressable names are not containers.
            if Self::ensure_name_safe(&name).is_err() {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                containers.push(container_from(name, &meta));
            }
        }
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(containers)
    }

    /// Recursively delete a container and everything in it.
    async fn destroy_container(&self, name: &str) -> StorageResult<()> {
        self.container_metadata(name).await?;
        let path = self.container_path(name);
        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                debug!("removed container directory {}", path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::ContainerNotFound(name.to_string()))
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

fn container_from(name: String, meta: &Metadata) -> Container {
    let (atime, mtime, ctime) = times(meta);
    Container {
        name,
        size: meta.len(),
        atime,
        mtime,
        ctime,
    }
}

fn file_from(container: &str, name: String, meta: &Metadata) -> FileInfo {
    let (atime, mtime, ctime) = times(meta);
    FileInfo {
        container: container.to_string(),
        name,
        size: meta.len(),
        atime,
        mtime,
        ctime,
    }
}

/// Access, modification and creation times. Platforms that do not record a
/// timestamp report the modification time in its place.
fn times(meta: &Metadata) -> (DateTime<Utc>, DateTime<Utc>, DateTime<Utc>) {
    let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let atime = meta.accessed().unwrap_or(mtime);
    let ctime = meta.created().unwrap_or(mtime);
    (atime.into(), mtime.into(), ctime.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn service() -> (TempDir, StorageService) {
        let dir = tempfile::tempdir().unwrap();
        let service = StorageService::new(dir.path());
        (dir, service)
    }

    fn body(bytes: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> + Send {
        futures::stream::iter(
            bytes
                .chunks(2)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn create_get_and_list_containers() {
        let (_dir, service) = service();
        let created = service.create_container("a-container-to-create").await.unwrap();
        assert_eq!(created.name, "a-container-to-create");
        service.create_container("alpha").await.unwrap();

        assert_eq!(
            service.get_container("alpha").await.unwrap().name,
            "alpha"
        );
        let names: Vec<_> = service
            .list_containers()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["a-container-to-create", "alpha"]);

        assert!(matches!(
            service.create_container("alpha").await,
            Err(StorageError::ContainerAlreadyExists(_))
        ));
        assert!(matches!(
            service.get_container("missing").await,
            Err(StorageError::ContainerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unsafe_names_are_rejected() {
        let (_dir, service) = service();
        for name in ["", ".", "..", "a/b", "a\\b", ".tmp-x", "tab\there"] {
            assert!(
                matches!(
                    service.create_container(name).await,
                    Err(StorageError::InvalidName { .. })
                ),
                "accepted {:?}",
                name
            );
        }
        service.create_container("c").await.unwrap();
        assert!(matches!(
            service.upload_file_stream("c", "../escape", None, body(b"x")).await,
            Err(StorageError::InvalidName { .. })
        ));
    }

    #[tokio::test]
    async fn upload_download_and_remove_files() {
        let (_dir, service) = service();
        service.create_container("c").await.unwrap();

        let uploaded = service
            .upload_file_stream("c", "a-file.txt", Some("text/plain".into()), body(b"hello"))
            .await
            .unwrap();
        assert_eq!(uploaded.size, 5);
        assert_eq!(uploaded.content_type, "text/plain");

        let overwritten = service
            .upload_file_stream("c", "a-file.txt", None, body(b"\x01\x02\x03"))
            .await
            .unwrap();
        assert_eq!(overwritten.content_type, "application/octet-stream");

        let (info, _file) = service.open_file("c", "a-file.txt").await.unwrap();
        assert_eq!((info.container.as_str(), info.size), ("c", 3));
        let on_disk = fs::read(service.file_path("c", "a-file.txt")).await.unwrap();
        assert_eq!(on_disk, [1, 2, 3]);

        let listed = service.list_files("c").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "a-file.txt");

        service.remove_file("c", "a-file.txt").await.unwrap();
        assert!(matches!(
            service.get_file("c", "a-file.txt").await,
            Err(StorageError::FileNotFound { .. })
        ));
        assert!(service.list_files("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_leaves_nothing_behind() {
        let (_dir, service) = service();
        service.create_container("c").await.unwrap();

        let broken = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"part")),
            Err(io::Error::new(ErrorKind::ConnectionReset, "client went away")),
        ]);
        assert!(matches!(
            service.upload_file_stream("c", "f", None, broken).await,
            Err(StorageError::Io(_))
        ));

        let mut entries = fs::read_dir(service.container_path("c")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn destroy_all_empties_storage_for_any_count() {
        for count in [0usize, 1, 5] {
            let (_dir, service) = service();
            for i in 0..count {
                let name = format!("container-{}", i);
                service.create_container(&name).await.unwrap();
                service
                    .upload_file_stream(&name, "f", None, body(b"data"))
                    .await
                    .unwrap();
            }
            service.destroy_all().await.unwrap();
            assert!(service.list_containers().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn stray_directories_do_not_block_destroy_all() {
        let (dir, service) = service();
        service.create_container("kept").await.unwrap();
        std::fs::create_dir(dir.path().join(format!("{}stale", TMP_PREFIX))).unwrap();
        std::fs::create_dir(dir.path().join("bad\u{7}name")).unwrap();

        let names: Vec<_> = service
            .list_containers()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["kept"]);

        service.destroy_all().await.unwrap();
        assert!(service.list_containers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn destroy_all_reports_unreadable_root() {
        let dir = tempfile::tempdir().unwrap();
        let service = StorageService::new(dir.path().join("missing"));
        assert!(matches!(
            service.destroy_all().await,
            Err(StorageError::Io(err)) if err.kind() == ErrorKind::NotFound
        ));
    }

    /// In-memory store that records deletions and can fail on demand.
    struct FakeStore {
        names: Vec<&'static str>,
        fail_listing: bool,
        fail_on: Vec<&'static str>,
        deleted: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn new(names: Vec<&'static str>) -> Self {
            Self {
                names,
                fail_listing: false,
                fail_on: Vec::new(),
                deleted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ContainerStore for FakeStore {
        async fn list_containers(&self) -> StorageResult<Vec<Container>> {
            if self.fail_listing {
                return Err(StorageError::Io(io::Error::new(
                    ErrorKind::PermissionDenied,
                    "listing denied",
                )));
            }
            let now = Utc::now();
            Ok(self
                .names
                .iter()
                .map(|name| Container {
                    name: name.to_string(),
                    size: 0,
                    atime: now,
                    mtime: now,
                    ctime: now,
                })
                .collect())
        }

        async fn destroy_container(&self, name: &str) -> StorageResult<()> {
            if self.fail_on.iter().any(|f| *f == name) {
                return Err(StorageError::ContainerNotFound(name.to_string()));
            }
            self.deleted.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn listing_failure_is_reported_without_deleting() {
        let mut store = FakeStore::new(vec!["a", "b"]);
        store.fail_listing = true;

        let err = destroy_all_containers(&store).await.unwrap_err();
        match err {
            StorageError::Io(inner) => {
                assert_eq!(inner.kind(), ErrorKind::PermissionDenied);
                assert_eq!(inner.to_string(), "listing denied");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(store.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sibling_deletions_continue_after_a_failure() {
        let mut store = FakeStore::new(vec!["a", "b", "c", "d"]);
        store.fail_on = vec!["b", "d"];

        let err = destroy_all_containers(&store).await.unwrap_err();
        assert!(matches!(err, StorageError::ContainerNotFound(name) if name == "b"));

        let mut deleted = store.deleted.lock().unwrap().clone();
        deleted.sort();
        assert_eq!(deleted, ["a", "c"]);
    }
}

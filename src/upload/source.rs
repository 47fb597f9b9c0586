//! Upload sources
//!
//! A [`ChunkSource`] is anything that can hand out byte ranges of a named file.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Sliceable file content
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// File name sent to the backend
    fn name(&self) -> &str;

    /// Total size in bytes
    fn size(&self) -> u64;

    /// Read `[start, end)`
    async fn read_range(&self, start: u64, end: u64) -> io::Result<Bytes>;
}

fn check_range(start: u64, end: u64, size: u64) -> io::Result<()> {
    if start > end || end > size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("range {}..{} outside source of {} bytes", start, end, size),
        ));
    }
    Ok(())
}

/// A file on the local filesystem.
///
/// The size is captured when the source is opened; every read reopens the
/// file so reads never share a cursor.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    size: u64,
}

impl FileSource {
    pub async fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

        Ok(Self {
            path,
            name,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChunkSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&self, start: u64, end: u64) -> io::Result<Bytes> {
        check_range(start, end, self.size)?;

        let len = usize::try_from(end - start)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(io::SeekFrom::Start(start)).await?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }
}

/// In-memory content
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Bytes,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl ChunkSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&self, start: u64, end: u64) -> io::Result<Bytes> {
        check_range(start, end, self.size())?;
        Ok(self.data.slice(start as usize..end as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_memory_source_slices() {
        let source = MemorySource::new("a.txt", "hello world");
        assert_eq!(source.size(), 11);
        assert_eq!(source.read_range(6, 11).await.unwrap(), Bytes::from("world"));
        assert!(source.read_range(6, 12).await.is_err());
    }

    #[tokio::test]
    async fn test_file_source_reads_ranges() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let source = FileSource::open(file.path()).await.unwrap();
        assert_eq!(source.size(), 10);
        assert!(!source.name().is_empty());
        assert_eq!(source.read_range(3, 7).await.unwrap(), Bytes::from("3456"));
        assert_eq!(source.read_range(10, 10).await.unwrap(), Bytes::new());
    }

    #[tokio::test]
    async fn test_file_source_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileSource::open(dir.path()).await.is_err());
    }
}

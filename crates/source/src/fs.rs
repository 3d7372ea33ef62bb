//! Filesystem-backed bucket: each container is a directory under a root.

use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::stream::ExactLengthStream;
use crate::{BoxFuture, ByteStream, ObjectReader, ObjectRef, OpenedObject, ReadError};

/// Reads objects from `<root>/<container>/<key>`.
#[derive(Debug, Clone)]
pub struct FsObjectReader {
    root: PathBuf,
}

impl FsObjectReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, object: &ObjectRef) -> Result<PathBuf, ReadError> {
        let container = relative(&object.container)?;
        let key = relative(&object.key)?;
        Ok(self.root.join(container).join(key))
    }

    async fn open_file(&self, object: &ObjectRef) -> Result<(tokio::fs::File, u64), ReadError> {
        let path = self.path_for(object)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReadError::NotFound(object.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(ReadError::NotFound(object.to_string()));
        }
        Ok((file, meta.len()))
    }
}

/// Rejects references that would escape the root.
fn relative(part: &str) -> Result<&Path, ReadError> {
    if part.is_empty() {
        return Err(ReadError::InvalidObject("empty path".into()));
    }
    let path = Path::new(part);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ReadError::InvalidObject(format!(
                    "path escapes bucket root: {part}"
                )));
            }
        }
    }
    Ok(path)
}

impl ObjectReader for FsObjectReader {
    fn stat<'a>(&'a self, object: &'a ObjectRef) -> BoxFuture<'a, Result<u64, ReadError>> {
        Box::pin(async move {
            let (_, size) = self.open_file(object).await?;
            Ok(size)
        })
    }

    fn open<'a>(&'a self, object: &'a ObjectRef) -> BoxFuture<'a, Result<OpenedObject, ReadError>> {
        Box::pin(async move {
            let (file, size) = self.open_file(object).await?;
            debug!(object = %object, size, "opened source object");
            let stream: ByteStream = Box::pin(ReaderStream::new(file.take(size)));
            Ok(OpenedObject {
                size,
                stream: ExactLengthStream::boxed(stream, size),
            })
        })
    }

    fn open_range<'a>(
        &'a self,
        object: &'a ObjectRef,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, Result<ByteStream, ReadError>> {
        Box::pin(async move {
            let (mut file, size) = self.open_file(object).await?;
            if start > end || end >= size {
                return Err(ReadError::InvalidRange { start, end, size });
            }
            file.seek(SeekFrom::Start(start)).await?;
            let len = end - start + 1;
            let stream: ByteStream = Box::pin(ReaderStream::new(file.take(len)));
            Ok(ExactLengthStream::boxed(stream, len))
        })
    }
}

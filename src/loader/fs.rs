//! Filesystem loader

use async_trait::async_trait;

use super::{LoadedSource, Loader};
use crate::{Error, Result};

/// Reads module ids as file paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

#[async_trait]
impl Loader for FsLoader {
    async fn load(&self, id: &str) -> Result<Option<LoadedSource>> {
        match tokio::fs::read_to_string(id).await {
            Ok(code) => Ok(Some(code.into())),
            Err(err) => Err(Error::Load {
                id: id.to_string(),
                importer: None,
                message: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.js");
        std::fs::write(&path, "export default 1;").unwrap();

        let id = crate::path::to_id(&path);
        assert_eq!(FsLoader.load(&id).await.unwrap().map(|source| source.code).as_deref(), Some("export default 1;"));

        let missing = crate::path::to_id(&dir.path().join("missing.js"));
        let err = FsLoader.load(&missing).await.unwrap_err();
        assert_eq!(err.code(), "LOAD_ERROR");
    }
}

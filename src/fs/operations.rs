use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use tokio::{
    fs::{self, File},
    io::{self, AsyncWriteExt},
};

/// Path of the scratch file used while replacing `path`. It sits in the same directory so that
/// the final rename never crosses filesystems.
pub fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("data"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replaces contents of `path` with `contents` as a single step. Data is written into a sibling
/// file, synced, and then renamed over the target, so a crash leaves either the old or the new
/// contents but never a mix of both.
pub async fn replace_file_contents(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let temporary = temporary_sibling(path);

    let mut file = File::create(&temporary).await?;
    let written = async {
        file.write_all(contents).await?;
        file.sync_all().await
    }
    .await;
    drop(file);

    if let Err(e) = written {
        let _ = fs::remove_file(&temporary).await;
        return Err(e);
    }

    fs::rename(&temporary, path).await
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{replace_file_contents, temporary_sibling};

    #[test]
    fn test_temporary_sibling_keeps_directory() {
        let path = Path::new("/state/screentime/history.txt");
        assert_eq!(
            temporary_sibling(path),
            Path::new("/state/screentime/history.txt.tmp")
        );
    }

    #[tokio::test]
    async fn test_replace_creates_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("log.txt");

        replace_file_contents(&path, b"first\n").await?;

        assert_eq!(tokio::fs::read_to_string(&path).await?, "first\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_overwrites_and_cleans_up() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("log.txt");
        tokio::fs::write(&path, "old line\nanother old line\n").await?;

        replace_file_contents(&path, b"new\n").await?;

        assert_eq!(tokio::fs::read_to_string(&path).await?, "new\n");
        assert!(!temporary_sibling(&path).exists());
        let entries = std::fs::read_dir(dir.path())?.count();
        assert_eq!(entries, 1);
        Ok(())
    }
}

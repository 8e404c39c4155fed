use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

const APPLICATION_DIR_NAME: &str = "screentime";

/// Resolves the application directory, creating it when needed. An explicit `dir` wins over the
/// platform default.
pub fn application_path(dir: Option<PathBuf>) -> Result<PathBuf> {
    let path = match dir {
        Some(dir) => dir,
        None => default_application_path()?,
    };

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

fn default_application_path() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let mut path = env::var("APPDATA")
            .map(PathBuf::from)
            .map_err(|_| anyhow!("APPDATA should be present on Windows"))?;
        path.push(APPLICATION_DIR_NAME);
        Ok(path)
    }
    #[cfg(not(windows))]
    {
        let mut path = env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .or_else(|_| {
                env::var("HOME").map(|home| {
                    let mut path = PathBuf::from(home);
                    path.push(".local/state");
                    path
                })
            })
            .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))?;
        path.push(APPLICATION_DIR_NAME);
        Ok(path)
    }
}

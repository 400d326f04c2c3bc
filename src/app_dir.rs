//! Per-user data directory holding the keystore and the `.env` file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

const QUALIFIER: &str = "";
const ORGANIZATION: &str = "";
const APPLICATION: &str = "Wallet-Router";

pub const KEYSTORE_FILE: &str = "keystore.json";
pub const ENV_FILE: &str = ".env";

pub fn data_dir() -> io::Result<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory for wallet data"))
}

/// Path of `filename` inside the data directory. Only bare file names are accepted.
pub fn data_file(filename: &str) -> io::Result<PathBuf> {
    if filename.is_empty() || filename.contains(std::path::is_separator) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid data file name: {:?}", filename),
        ));
    }
    Ok(data_dir()?.join(filename))
}

/// Creates the data directory if needed. It holds key material, so on unix it is made
/// accessible to the owner only.
pub fn ensure_data_dir() -> io::Result<PathBuf> {
    let dir = data_dir()?;
    ensure_private_dir(&dir)?;
    Ok(dir)
}

fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    if !fs::metadata(dir)?.is_dir() {
        return Err(io::Error::other(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

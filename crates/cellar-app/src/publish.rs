//! The wizard endpoint published for helper scripts.

use anyhow::{Context, Result};
use cellar_core::KeyValueFile;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub(crate) const PUBLISHED_FILE: &str = "cellar.cfg";
pub(crate) const PORT_KEY: &str = "WIZARD_PORT";
pub(crate) const COOKIE_KEY: &str = "WIZARD_COOKIE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Endpoint {
    pub port: u16,
    pub cookie: String,
}

pub(crate) fn published_path(home: &Path) -> PathBuf {
    home.join(PUBLISHED_FILE)
}

/// Record the bound port and cookie, keeping other keys in the file.
pub(crate) fn publish(home: &Path, endpoint: &Endpoint) -> Result<()> {
    let path = published_path(home);
    let mut file = KeyValueFile::load(&path)?;
    file.set(PORT_KEY, endpoint.port.to_string());
    file.set(COOKIE_KEY, endpoint.cookie.as_str());
    file.save()
        .with_context(|| format!("failed to publish wizard endpoint to {}", path.display()))?;
    info!(path = %path.display(), port = endpoint.port, "wizard endpoint published");
    Ok(())
}

/// Remove the endpoint keys on shutdown.
pub(crate) fn unpublish(home: &Path) -> Result<()> {
    let path = published_path(home);
    let mut file = KeyValueFile::load(&path)?;
    let removed = file.remove(PORT_KEY) | file.remove(COOKIE_KEY);
    if removed {
        file.save()?;
    }
    Ok(())
}

/// A published endpoint, withdrawn when dropped so that no exit path
/// leaves a stale port and cookie behind.
#[derive(Debug)]
pub(crate) struct Published {
    home: PathBuf,
}

impl Published {
    pub(crate) fn new(home: &Path, endpoint: &Endpoint) -> Result<Self> {
        publish(home, endpoint)?;
        Ok(Self {
            home: home.to_path_buf(),
        })
    }
}

impl Drop for Published {
    fn drop(&mut self) {
        if let Err(error) = unpublish(&self.home) {
            warn!(error = %format!("{error:#}"), "failed to unpublish wizard endpoint");
        }
    }
}

pub(crate) fn read_endpoint(home: &Path) -> Result<Endpoint> {
    let path = published_path(home);
    let file = KeyValueFile::load(&path)?;
    let port = file
        .get(PORT_KEY)
        .with_context(|| format!("{PORT_KEY} not set in {}; is cellar running?", path.display()))?;
    let port = port
        .trim()
        .parse()
        .with_context(|| format!("invalid {PORT_KEY} {port:?} in {}", path.display()))?;
    let cookie = file
        .get(COOKIE_KEY)
        .with_context(|| format!("{COOKIE_KEY} not set in {}", path.display()))?
        .to_owned();
    Ok(Endpoint { port, cookie })
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("nested");
        let endpoint = Endpoint {
            port: 30004,
            cookie: "abcDEF123".into(),
        };
        publish(&home, &endpoint).unwrap();
        assert_eq!(read_endpoint(&home).unwrap(), endpoint);
    }

    #[test]
    fn publish_keeps_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = published_path(dir.path());
        std::fs::write(&path, "# prefix settings\nARCH=win64\nWIZARD_PORT=1\n").unwrap();

        publish(
            dir.path(),
            &Endpoint {
                port: 30001,
                cookie: "c".into(),
            },
        )
        .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# prefix settings\nARCH=win64\nWIZARD_PORT=30001\n"));
        assert!(content.contains("WIZARD_COOKIE=c\n"));

        unpublish(dir.path()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "# prefix settings\nARCH=win64\n");
    }

    #[test]
    fn early_return_still_withdraws_endpoint() {
        fn start_then_fail(home: &Path) -> Result<()> {
            let _published = Published::new(
                home,
                &Endpoint {
                    port: 30002,
                    cookie: "k".into(),
                },
            )?;
            assert!(read_endpoint(home).is_ok());
            anyhow::bail!("terminal unavailable")
        }

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(published_path(dir.path()), "ARCH=win32\n").unwrap();
        assert!(start_then_fail(dir.path()).is_err());

        let content = std::fs::read_to_string(published_path(dir.path())).unwrap();
        assert_eq!(content, "ARCH=win32\n");
    }

    #[test]
    fn missing_endpoint_explains_itself() {
        let dir = tempfile::tempdir().unwrap();
        let error = format!("{:#}", read_endpoint(dir.path()).unwrap_err());
        assert!(error.contains("is cellar running"), "{error}");

        std::fs::write(published_path(dir.path()), "WIZARD_PORT=http\n").unwrap();
        let error = format!("{:#}", read_endpoint(dir.path()).unwrap_err());
        assert!(error.contains("invalid WIZARD_PORT"), "{error}");
    }
}

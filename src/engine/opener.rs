//! Navigation target opening

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

/// Boundary to the host's URL handler
#[async_trait]
pub trait LinkOpener: Send + Sync {
    /// Open an external resource
    async fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Opens navigation targets with the desktop's URL handler
pub struct SystemOpener;

#[async_trait]
impl LinkOpener for SystemOpener {
    async fn open(&self, url: &str) -> std::io::Result<()> {
        #[cfg(target_os = "macos")]
        let program = "open";
        #[cfg(not(target_os = "macos"))]
        let program = "xdg-open";

        info!(%url, "opening navigation target");
        let status = Command::new(program)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(std::io::Error::other(format!(
                "{program} exited with {status}"
            )));
        }
        Ok(())
    }
}

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use fcnamecolor_core::{Configuration, Persistence, StoreResult};
use log::debug;
use tokio::fs;

/// Keeps the cache document in a pretty-printed JSON file.
///
/// Saves go to a temporary file first and are renamed into place, so a crash mid-save
/// leaves the previous document intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");

        self.path.with_file_name(name)
    }
}

#[async_trait]
impl Persistence for JsonFileStore {
    async fn load(&self) -> StoreResult<Option<Configuration>> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist yet", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let document = serde_json::from_str(&text)?;
        Ok(Some(document))
    }

    async fn save(&self, document: &Configuration) -> StoreResult<()> {
        let text = serde_json::to_string_pretty(document)?;
        let temp_path = self.temp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&temp_path, text).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!("Saved cache document to {}", self.path.display());
        Ok(())
    }
}

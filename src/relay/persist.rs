use super::FormKind;
use crate::epoch_millis;
use serde_json::{Map, Value};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write submission file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize submission: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write `form_data` as pretty JSON to `<dir>/<kind>-<epoch-ms>.json`.
///
/// The directory is created if missing. Files are never overwritten: when the
/// name is taken the millisecond suffix moves forward until a free one is found.
///
/// # Errors
/// Returns an error if the directory or file cannot be created or written.
pub async fn write_submission(
    dir: &Path,
    kind: FormKind,
    form_data: &Map<String, Value>,
) -> Result<PathBuf, PersistError> {
    let body = serde_json::to_vec_pretty(form_data)?;

    fs::create_dir_all(dir).await?;

    let mut stamp = epoch_millis();
    loop {
        let path = dir.join(format!("{}-{stamp}.json", kind.slug()));

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(&body).await?;
                file.sync_all().await?;
                return Ok(path);
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => stamp += 1,
            Err(err) => return Err(err.into()),
        }
    }
}

//! JSON dump of scraped news.
//!
//! The file holds a single pretty-printed array of [`NewsRecord`] objects,
//! non-ASCII text kept as is.

use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::models::NewsRecord;
use crate::utils::ensure_writable_parent;

/// Write `records` to `path`, creating parent directories as needed.
///
/// # Arguments
///
/// * `records` - Records to serialize, in output order
/// * `path` - Destination file; it is replaced if it exists
///
/// # Returns
///
/// `Ok(())` once the pretty-printed JSON array is on disk, or the
/// directory, serialization or write error.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn write_records(records: &[NewsRecord], path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(records)?;

    ensure_writable_parent(path).await?;

    info!("Writing JSON");
    if let Err(e) = fs::write(path, json).await {
        error!(error = %e, "Failed to write JSON");
        return Err(e.into());
    }
    info!("Wrote news records");

    Ok(())
}

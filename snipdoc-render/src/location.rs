use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use url::Url;

/// Maps a document location to a local file. Plain paths and `file://` URLs
/// are accepted; fetching over the network belongs to the caller.
pub fn resolve_location(location: &str) -> Result<PathBuf> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        bail!("no document location given");
    }

    match Url::parse(trimmed) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|_| anyhow!("invalid file URL {trimmed}")),
        // Single-letter schemes are Windows drive letters.
        Ok(url) if url.scheme().len() > 1 => bail!(
            "unsupported URL scheme `{}`; only local documents can be opened",
            url.scheme()
        ),
        _ => Ok(PathBuf::from(trimmed)),
    }
}

/// Image import
///
/// Turns image files on disk into selfies of an event, one at a time
/// (`probe`) or a whole folder tree at once (`import_folder`).
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::state::data::{Event, NewSelfie};
use crate::state::store::SelfieStore;

/// Extensions the wall can render
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// Result of a folder import operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported_count: usize,
    /// Already part of the event
    pub skipped_count: usize,
    /// Not decodable or not readable
    pub failed_count: usize,
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Check that `path` is a decodable image and describe it as a new selfie.
/// The stored image ref is the canonical absolute path.
pub fn probe(path: &Path, display_name: Option<String>, message: Option<String>) -> Result<NewSelfie> {
    let path = path.canonicalize()?;
    let (width, height) = image::image_dimensions(&path)?;
    let file_size = std::fs::metadata(&path)?.len();
    debug!(path = %path.display(), width, height, "probed image");

    Ok(NewSelfie {
        image_ref: Some(path.to_string_lossy().into_owned()),
        display_name,
        message,
        file_size_bytes: i64::try_from(file_size).ok(),
    })
}

/// Add every image under `folder` (recursively) to `event`.
/// Files already in the event are skipped; unreadable ones are counted and logged.
pub fn import_folder(store: &SelfieStore, event: &Event, folder: &Path) -> Result<ImportResult> {
    if !folder.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("not a folder: {}", folder.display()),
        )));
    }

    info!(folder = %folder.display(), event = %event.slug, "scanning folder");
    let mut result = ImportResult::default();

    for entry in WalkDir::new(folder)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_image_file(path) {
            continue;
        }

        let outcome = probe(path, None, None).and_then(|new| store.create_selfie(event, &new));
        match outcome {
            Ok(_) => {
                result.imported_count += 1;
                if result.imported_count % 100 == 0 {
                    info!(imported = result.imported_count, "import progress");
                }
            }
            Err(Error::DuplicateImage(_)) => result.skipped_count += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not import file");
                result.failed_count += 1;
            }
        }
    }

    info!(
        imported = result.imported_count,
        skipped = result.skipped_count,
        failed = result.failed_count,
        "import complete"
    );
    Ok(result)
}

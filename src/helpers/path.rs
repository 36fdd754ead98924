//! File-name helpers shared by the image extractor and the writers.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static RESERVED_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("Hardcode regex pattern"));

/// Replaces characters that are not allowed in Windows file names with `_`.
pub fn sanitize_for_path(value: &str) -> String {
    RESERVED_CHARACTERS.replace_all(value, "_").into_owned()
}

/// Workbook base name without extension, as used in every output file name.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Workbook file name with extension, the registry key for a workbook.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Joins path segments with `/` so links written into GeoJSON are platform independent.
pub fn join_link(segments: &[&str]) -> String {
    segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

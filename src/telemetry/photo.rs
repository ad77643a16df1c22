use once_cell::sync::Lazy;
use regex::Regex;

static LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"captured_image_(.*?)\.jpg").expect("label pattern is valid"));

/// Label the camera encodes in `captured_image_<label>.jpg`, possibly empty.
/// A file name that does not match yields `"Unknown"`.
pub fn photo_label(file_name: &str) -> String {
    LABEL_PATTERN
        .captures(file_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("Unknown")
        .to_owned()
}

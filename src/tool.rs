//! Some useful tools for the project.
//!
//! Usually, you don't need to use this module directly.
//! [`crate::download`] will automatically use these tools.

use reqwest::Url;

/// The extension used when the image URL has none.
pub const DEFAULT_EXTENSION: &str = ".webp";

/// Get the dot-suffix of a file name, including the dot.
///
/// Leading dots are not an extension, so `.hidden` has none.
#[inline]
fn dot_suffix(file_name: &str) -> Option<&str> {
    let stem_start = file_name.len() - file_name.trim_start_matches('.').len();
    let dot = file_name[stem_start..].rfind('.')? + stem_start;
    Some(&file_name[dot..])
}

/// Get the file extension of the last path segment of a URL.
pub(crate) trait FileExtension {
    /// The extension including the leading dot, or `None` if there is none.
    fn file_extension(&self) -> Option<&str>;
}

impl FileExtension for Url {
    fn file_extension(&self) -> Option<&str> {
        let file_name = self.path().rsplit('/').next()?;
        dot_suffix(file_name)
    }
}

impl FileExtension for str {
    /// For strings that don't parse as [`Url`], the part after the last `/` is used as is.
    fn file_extension(&self) -> Option<&str> {
        let file_name = self.rsplit('/').next()?;
        dot_suffix(file_name)
    }
}

/// The extension to save the image at `url` with, [`DEFAULT_EXTENSION`] if it has none.
pub fn extension_for(url: &str) -> String {
    let extension = match Url::parse(url) {
        Ok(url) => url.file_extension().map(str::to_owned),
        Err(_) => url.file_extension().map(str::to_owned),
    };
    extension.unwrap_or_else(|| DEFAULT_EXTENSION.to_owned())
}

/// Check that `name` is a single normal path component,
/// so that joining it to the save directory stays inside the directory.
pub fn is_safe_file_stem(name: &str) -> bool {
    !(name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("https://x/e.png"), ".png");
        assert_eq!(extension_for("https://x/e"), ".webp");
        assert_eq!(extension_for("https://x/dir.d/e"), ".webp");
        assert_eq!(extension_for("https://x/a/e.tar.gz"), ".gz");
        assert_eq!(extension_for("https://x/e.gif?v=2#frag"), ".gif");
        assert_eq!(extension_for("https://x/.hidden"), ".webp");
        assert_eq!(extension_for("https://x/"), ".webp");
        assert_eq!(extension_for("files/e.apng"), ".apng");
    }

    #[test]
    fn test_is_safe_file_stem() {
        assert!(is_safe_file_stem("pity_face"));
        assert!(is_safe_file_stem("blob.cat"));
        assert!(!is_safe_file_stem(""));
        assert!(!is_safe_file_stem(".."));
        assert!(!is_safe_file_stem("../etc"));
        assert!(!is_safe_file_stem("a\\b"));
    }
}

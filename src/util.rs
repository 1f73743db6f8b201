//! Private utility module
use std::path::{Path, PathBuf};

/// Characters removed from every decoded header string.
const CONTROL_CHARS: [char; 4] = ['\n', '\r', '\t', '\0'];

/// Decode a fixed-width header string, dropping newlines, carriage
/// returns, tabs and NUL padding wherever they occur.
pub fn fixed_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| !CONTROL_CHARS.contains(c))
        .collect()
}

/// Check whether the path points to a gzip-compressed file, judging by
/// its extension.
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| a.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false)
}

/// Convert a file path to a header file (.hdr or .hdr.gz) to
/// the respective volume file with GZip compression (.img.gz).
pub fn into_img_file_gz(mut path: PathBuf) -> PathBuf {
    if is_gz_file(&path) {
        // Leave only the first extension (.hdr)
        let _ = path.set_extension("");
    }
    let _ = path.set_extension("img.gz");
    path
}

#[cfg(test)]
mod tests {
    use super::{fixed_str, into_img_file_gz, is_gz_file};
    use std::path::PathBuf;

    #[test]
    fn strips_control_characters() {
        assert_eq!(fixed_str(b"FSL3.2beta\0\0\0\0"), "FSL3.2beta");
        assert_eq!(fixed_str(b"a\tb\nc\rd"), "abcd");
        assert_eq!(fixed_str(&[0u8; 16]), "");
        assert_eq!(fixed_str(b"none   "), "none   ");
    }

    #[test]
    fn filenames() {
        assert!(!is_gz_file("/path/to/something.nii"));
        assert!(is_gz_file("/path/to/something.nii.gz"));
        assert!(!is_gz_file("volume.não"));
        assert!(is_gz_file("1.2.3.nii.gz"));
        assert!(!is_gz_file("1.2.3.nii"));
        assert!(!is_gz_file("/path/to/image.zarr"));

        let path = "/path/to/image.hdr";
        assert_eq!(
            into_img_file_gz(PathBuf::from(path)),
            PathBuf::from("/path/to/image.img.gz")
        );

        let path = "/path/to/image.hdr.gz";
        assert_eq!(
            into_img_file_gz(PathBuf::from(path)),
            PathBuf::from("/path/to/image.img.gz")
        );
    }
}

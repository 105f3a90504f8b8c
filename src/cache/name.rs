//! Image name normalization
//!
//! All registry lookups go through a normalized key: path separators
//! unified, a trailing image extension stripped, case folded. The display
//! name keeps whatever the caller wrote.

/// Longest accepted image name; longer requests resolve to the default image
pub const MAX_IMAGE_NAME: usize = 256;

/// Extensions stripped from the end of a name during normalization
const KNOWN_EXTENSIONS: [&str; 5] = [".tga", ".png", ".dds", ".jpg", ".bmp"];

/// Substrings whose images must never be downsized, regardless of what the
/// request asked for (fonts and UI art go blurry otherwise)
const NO_DOWNSIZE_PATHS: [&str; 4] = ["fonts/", "guis/assets/", "postprocess/", "video/"];

/// Normalize a requested name into a registry key
pub fn normalize(name: &str) -> String {
    let mut key = name.replace('\\', "/");
    let lower = key.to_ascii_lowercase();
    for ext in KNOWN_EXTENSIONS {
        if lower.ends_with(ext) {
            key.truncate(key.len() - ext.len());
            break;
        }
    }
    key.make_ascii_lowercase();
    key
}

/// Names that always resolve to the singleton default image
pub fn is_default_name(name: &str) -> bool {
    name.is_empty()
        || name.eq_ignore_ascii_case("default")
        || name.eq_ignore_ascii_case("_default")
}

/// Whether a normalized key falls under the no-downsize path rules
pub fn forces_no_downsize(key: &str) -> bool {
    NO_DOWNSIZE_PATHS.iter().any(|p| key.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_case_folds() {
        assert_eq!(normalize("Textures/Rock01"), "textures/rock01");
    }

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize("textures\\base\\wall01"), "textures/base/wall01");
    }

    #[test]
    fn test_normalize_strips_extension() {
        assert_eq!(normalize("textures/rock01.tga"), "textures/rock01");
        assert_eq!(normalize("textures/rock01.PNG"), "textures/rock01");
        // only a trailing extension is stripped, not inner dots
        assert_eq!(normalize("textures/v1.5/rock"), "textures/v1.5/rock");
    }

    #[test]
    fn test_normalize_equivalent_requests_share_key() {
        assert_eq!(
            normalize("Textures\\Base\\Wall01.TGA"),
            normalize("textures/base/wall01")
        );
    }

    #[test]
    fn test_default_names() {
        assert!(is_default_name(""));
        assert!(is_default_name("default"));
        assert!(is_default_name("_DEFAULT"));
        assert!(!is_default_name("_white"));
    }

    #[test]
    fn test_no_downsize_paths() {
        assert!(forces_no_downsize("fonts/consolefont"));
        assert!(forces_no_downsize("guis/assets/splash"));
        assert!(!forces_no_downsize("textures/rock01"));
    }
}

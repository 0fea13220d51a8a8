use std::fmt;

use crate::error::ModelStoreError;

/// Extension used when an upload carries no filename suffix.
pub const DEFAULT_FILE_EXTENSION: &str = "mlmodel";

/// A machine-learning model file as stored in the registry.
///
/// `(name, version)` is the identity key. `file_extension` only feeds the
/// derived file name and is not part of identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub name: String,
    pub version: String,
    pub content: Vec<u8>,
    pub file_extension: String,
}

impl Model {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        content: impl Into<Vec<u8>>,
        file_extension: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            content: content.into(),
            file_extension: file_extension.into(),
        }
    }

    /// The file name this model is stored and served under.
    pub fn file_name(&self) -> String {
        create_model_file_name(&self.name, &self.version, &self.file_extension)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Build `{name}-{version}.{extension}`.
///
/// Also used as a pattern template: the local store passes a regex wildcard as
/// the extension to find a model file whose extension is unknown.
pub fn create_model_file_name(name: &str, version: &str, extension: &str) -> String {
    format!("{name}-{version}.{extension}")
}

/// Reject keys that cannot be stored as a single file name in one directory
/// or served back in a `Content-Disposition` header.
pub fn validate_model_key(name: &str, version: &str) -> Result<(), ModelStoreError> {
    for part in [name, version] {
        if part.contains(['/', '\\']) {
            return Err(ModelStoreError::invalid_key(name, version, "path separator"));
        }
        if part == "." || part == ".." {
            return Err(ModelStoreError::invalid_key(name, version, "relative path component"));
        }
        if part.chars().any(char::is_control) {
            return Err(ModelStoreError::invalid_key(name, version, "control character"));
        }
    }
    Ok(())
}

/// Extract the extension from an uploaded file name, falling back to
/// [`DEFAULT_FILE_EXTENSION`] when there is none.
pub fn extension_from_upload(file_name: Option<&str>) -> String {
    file_name
        .and_then(|f| std::path::Path::new(f).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map_or_else(|| DEFAULT_FILE_EXTENSION.to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_for_storage() {
        assert_eq!(
            create_model_file_name("my-model", "1.2.3", "pickle"),
            "my-model-1.2.3.pickle"
        );
    }

    #[test]
    fn file_name_as_mask() {
        assert_eq!(
            create_model_file_name("your-model", "4.0.4", "*"),
            "your-model-4.0.4.*"
        );
    }

    #[test]
    fn display_matches_file_name() {
        let model = Model::new("my-model", "0.0.7", b"binary repr of a model".to_vec(), "cbm");
        assert_eq!(model.to_string(), "my-model-0.0.7.cbm");
    }

    #[test]
    fn ordinary_keys_are_valid() {
        assert!(validate_model_key("my-model", "0.0.7").is_ok());
        assert!(validate_model_key("..weights", "1.0..rc").is_ok());
    }

    #[test]
    fn keys_that_leave_the_directory_are_rejected() {
        for (name, version) in [
            ("../escaped", "1"),
            ("my-model", "../../etc"),
            ("a\\b", "1"),
            ("..", "1"),
            ("my-model", "."),
        ] {
            assert!(
                matches!(
                    validate_model_key(name, version),
                    Err(ModelStoreError::InvalidKey { .. })
                ),
                "{name}/{version} should be rejected"
            );
        }
    }

    #[test]
    fn control_characters_are_rejected() {
        let err = validate_model_key("a\nb", "1");
        assert!(matches!(
            err,
            Err(ModelStoreError::InvalidKey {
                reason: "control character",
                ..
            })
        ));
        assert!(validate_model_key("my-model", "0.0.7\r").is_err());
    }

    #[test]
    fn upload_extension_taken_from_suffix() {
        assert_eq!(extension_from_upload(Some("my-model-0.0.7.cbm")), "cbm");
        assert_eq!(extension_from_upload(Some("weights.tar.gz")), "gz");
    }

    #[test]
    fn upload_without_suffix_defaults_to_mlmodel() {
        assert_eq!(extension_from_upload(Some("model2")), "mlmodel");
        assert_eq!(extension_from_upload(Some(".hidden")), "mlmodel");
        assert_eq!(extension_from_upload(None), "mlmodel");
    }
}

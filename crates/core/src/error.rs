use std::path::PathBuf;

/// Result alias that carries the custom [`UtuError`] type.
pub type Result<T> = std::result::Result<T, UtuError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum UtuError {
    /// The document is not valid JSON, or a value has the wrong JSON type.
    #[error("malformed document: {0}")]
    MalformedDocument(#[from] serde_json::Error),
    /// `file_info.kind` names a different format family.
    #[error("unsupported document kind `{kind}`")]
    UnsupportedFormat { kind: String },
    /// `file_info.version` is outside the range this codec understands.
    #[error("unsupported document version {found} (supported: 1..={supported})")]
    UnsupportedVersion { found: u64, supported: u16 },
    /// A required key is absent. `field` is a path such as `partials[2].envelopes`.
    #[error("missing required field `{field}`")]
    MissingField { field: String },
    /// A decoded partial does not carry every declared parameter.
    #[error("partial {index} is missing declared parameter `{parameter}`")]
    InconsistentPartial { index: usize, parameter: String },
    /// A partial lacks one of the five breakpoint envelopes.
    #[error("partial {index} has no `{parameter}` envelope")]
    MissingParameter { index: usize, parameter: String },
    /// A single append failed the parameter completeness check.
    #[error("partial rejected: missing parameter `{parameter}`")]
    RejectedAppend { parameter: String },
    /// A strict batch append failed at input position `index`.
    #[error("partial {index} rejected: missing parameter `{parameter}`")]
    RejectedPartial { index: usize, parameter: String },
    /// JSON has no representation for NaN or infinities.
    #[error("partial {partial} envelope `{parameter}` has a non-finite sample at {sample}")]
    NonFiniteSample {
        partial: usize,
        parameter: String,
        sample: usize,
    },
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Attaches the offending path to an error raised while handling a file.
    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<UtuError>,
    },
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl UtuError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn missing_field<T: Into<String>>(field: T) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Wraps `self` with the path of the file being processed.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Strips any file context and returns the underlying error.
    pub fn root(&self) -> &UtuError {
        match self {
            Self::File { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_context_names_path_and_cause() {
        let err = UtuError::missing_field("parameters").in_file("take1.json");
        let text = err.to_string();
        assert!(text.contains("take1.json"));
        assert!(text.contains("parameters"));
        assert!(matches!(err.root(), UtuError::MissingField { .. }));
    }
}

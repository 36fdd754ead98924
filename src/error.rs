use thiserror::Error;

/// Main error type for the survey conversion pipeline.
/// Aggregates errors from the standard library, third-party readers and writers, and internal modules.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    XlsError(#[from] calamine::XlsError),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    GeoJsonError(#[from] geojson::Error),

    #[error("{0}")]
    ShapefileError(#[from] shapefile::Error),

    #[error("{0}")]
    ImageError(#[from] image::ImageError),

    #[error("{0}")]
    XlsxWriterError(#[from] rust_xlsxwriter::XlsxError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Domain module errors
    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    ImageExtractError(#[from] crate::images::ImageError),

    #[error("{0}")]
    OutputError(#[from] crate::output::OutputError),
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, ConvertError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| ConvertError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_prefix_wraps_message() {
        let result: Result<(), ConvertError> = Err(std::io::Error::other("disk full").into());
        let error = result.with_prefix("write 'a.geojson'").unwrap_err();
        assert_eq!(error.to_string(), "write 'a.geojson': disk full");
    }

    #[test]
    fn ok_none_else_falls_back_only_on_none() {
        let none: Result<Option<u8>, ConvertError> = Ok(None);
        assert_eq!(none.ok_none_else(|| Ok(Some(7))).unwrap(), Some(7));

        let some: Result<Option<u8>, ConvertError> = Ok(Some(1));
        assert_eq!(some.ok_none_else(|| Ok(Some(7))).unwrap(), Some(1));
    }
}

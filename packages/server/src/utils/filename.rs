use thiserror::Error;

/// Longest accepted upload file name, in characters.
pub const MAX_FILENAME_CHARS: usize = 255;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("file name cannot be empty")]
    Empty,
    #[error("file name is longer than {MAX_FILENAME_CHARS} characters")]
    TooLong,
    #[error("file name must not contain control characters")]
    ControlCharacter,
}

/// Normalize a client-supplied upload file name.
///
/// Browsers may send a full path (`C:\Users\me\logo.png`); only the final
/// component is kept. The result is for display and type sniffing only and
/// never reaches an object key.
pub fn clean_upload_filename(raw: &str) -> Result<String, FilenameError> {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(FilenameError::Empty);
    }

    // Rejects CRLF, which would otherwise leak into log lines and headers.
    if base.chars().any(char::is_control) {
        return Err(FilenameError::ControlCharacter);
    }

    if base.chars().count() > MAX_FILENAME_CHARS {
        return Err(FilenameError::TooLong);
    }

    Ok(base.to_string())
}

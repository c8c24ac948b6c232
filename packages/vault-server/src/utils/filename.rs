/// Longest filename accepted, in characters.
pub const MAX_FILENAME_CHARS: usize = 255;

/// Fallback media type when none is declared and the extension is unknown.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Result of validating a flat filename.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    /// Filename is empty or whitespace-only.
    Empty,
    /// Filename is longer than [`MAX_FILENAME_CHARS`].
    TooLong,
    /// Filename contains path separators (`/` or `\`).
    ContainsPathSeparator,
    /// Filename is exactly `.` or `..`.
    PathTraversal,
    /// Filename contains null bytes.
    NullByte,
    /// Filename contains control characters (CR, LF, etc.).
    ControlCharacter,
}

impl FilenameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
            Self::TooLong => "Filename must be at most 255 characters",
            Self::ContainsPathSeparator => "Invalid filename: path separators are not allowed",
            Self::PathTraversal => "Invalid filename: '.' and '..' are not allowed",
            Self::NullByte => "Invalid filename: null bytes are not allowed",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
        }
    }
}

/// Validates a flat filename (no directory components allowed).
///
/// Vault files have no folder hierarchy, so a filename is a single segment.
/// Dotfiles are allowed; users upload `.env` or `.bashrc` backups.
pub fn validate_flat_filename(filename: &str) -> Result<&str, FilenameError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }

    if trimmed.chars().count() > MAX_FILENAME_CHARS {
        return Err(FilenameError::TooLong);
    }

    if trimmed.contains('\0') {
        return Err(FilenameError::NullByte);
    }

    // Reject ASCII control characters to prevent
    // HTTP header injection (e.g. CRLF in Content-Disposition).
    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(FilenameError::ControlCharacter);
    }

    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(FilenameError::ContainsPathSeparator);
    }

    if trimmed == "." || trimmed == ".." {
        return Err(FilenameError::PathTraversal);
    }

    Ok(trimmed)
}

/// Pick the media type to record for an upload.
///
/// The declared type wins when present. Otherwise it is guessed from the
/// filename extension.
pub fn resolve_media_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => mime_guess::from_path(filename)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
    }
}

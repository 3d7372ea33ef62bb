use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::TransferError;

/// Characters escaped in a URL path segment: everything but RFC 3986 unreserved.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes `segment` for use as a single URL path segment.
pub fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Decodes an object key the way the source store encodes it in
/// notifications: `+` is a literal space, then percent-escapes are decoded.
///
/// The result is the key the object is stored under.
pub fn decode_key(key: &str) -> Result<String, TransferError> {
    let spaced = key.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|k| k.into_owned())
        .map_err(|_| TransferError::InvalidKey(key.to_string()))
}

/// Derives the destination file name from a decoded object key: its final
/// path segment.
pub fn file_name_from_key(key: &str) -> Result<String, TransferError> {
    let name = key.rsplit('/').next().unwrap_or_default();
    validate_file_name(name)?;
    Ok(name.to_string())
}

/// Validates a single destination file name.
///
/// Rejects:
/// - Empty names
/// - `.` and `..`
/// - Names containing a path separator or NUL
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidFileName("empty file name".into()));
    }

    if name == "." || name == ".." {
        return Err(TransferError::InvalidFileName(format!(
            "relative path component not allowed: {name}"
        )));
    }

    if name.contains(['/', '\\', '\0']) {
        return Err(TransferError::InvalidFileName(format!(
            "separator or NUL not allowed: {name:?}"
        )));
    }

    Ok(())
}

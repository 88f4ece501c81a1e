//! Text encoding conversion between the configured module-file encoding and
//! the host's native legacy encoding.
//!
//! The host can only read and write module files in its own locale encoding
//! (Shift_JIS on the Japanese installations this tool targets), so exported
//! files are rewritten into the configured encoding after export, and files
//! to import are re-encoded into a temporary file first.

use camino::{Utf8Path, Utf8PathBuf};
use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::{Builder, NamedTempFile};
use thiserror::Error;

/// Errors from strict text encoding conversion.
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path} is not valid {encoding}")]
    Decode {
        encoding: &'static str,
        path: Utf8PathBuf,
    },

    #[error("{path} contains characters not representable in {encoding}")]
    Encode {
        encoding: &'static str,
        path: Utf8PathBuf,
    },
}

/// Encoding of the module text files on disk.
///
/// `ShiftJis` is the host's native legacy encoding; choosing it disables all
/// conversion steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TextEncoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "shift_jis", alias = "shift-jis", alias = "cp932")]
    ShiftJis,
}

impl TextEncoding {
    /// The encoding the host itself reads and writes module files in.
    pub fn host_native() -> TextEncoding {
        TextEncoding::ShiftJis
    }

    /// Whether module files in this encoding can be handed to the host
    /// without conversion.
    pub fn is_host_native(&self) -> bool {
        *self == Self::host_native()
    }

    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::ShiftJis => "shift_jis",
        }
    }

    fn encoding(&self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8 => UTF_8,
            TextEncoding::ShiftJis => SHIFT_JIS,
        }
    }
}

/// Read `path` and strictly decode it as `encoding`.
///
/// A leading byte-order mark matching the encoding is stripped; malformed
/// sequences are an error rather than replaced.
pub fn read_to_string(path: &Utf8Path, encoding: TextEncoding) -> Result<String, EncodingError> {
    let bytes = fs::read(path)?;
    let (text, _, had_errors) = encoding.encoding().decode(&bytes);
    if had_errors {
        return Err(EncodingError::Decode {
            encoding: encoding.label(),
            path: path.to_path_buf(),
        });
    }
    Ok(text.into_owned())
}

/// Write `text` to `path`, strictly encoded as `encoding`.
pub fn write_string(
    path: &Utf8Path,
    text: &str,
    encoding: TextEncoding,
) -> Result<(), EncodingError> {
    let (bytes, _, had_errors) = encoding.encoding().encode(text);
    if had_errors {
        return Err(EncodingError::Encode {
            encoding: encoding.label(),
            path: path.to_path_buf(),
        });
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Rewrite `path` in place from one encoding to another.
///
/// Used after export: the host writes its native encoding, the file on disk
/// should carry the configured one.
pub fn rewrite_file(
    path: &Utf8Path,
    from: TextEncoding,
    to: TextEncoding,
) -> Result<(), EncodingError> {
    if from == to {
        return Ok(());
    }
    let text = read_to_string(path, from)?;
    write_string(path, &text, to)?;
    tracing::debug!("Re-encoded {} from {} to {}", path, from.label(), to.label());
    Ok(())
}

/// Re-encode `path` into a temporary file the host can import directly.
///
/// The temporary file keeps the source file's extension (the host derives
/// the component kind from it) and is deleted when the returned handle
/// drops.
pub fn reencode_to_temp(
    path: &Utf8Path,
    from: TextEncoding,
    to: TextEncoding,
) -> Result<NamedTempFile, EncodingError> {
    let text = read_to_string(path, from)?;
    let suffix = match path.extension() {
        Some(ext) => format!(".{ext}"),
        None => String::new(),
    };
    let temp = Builder::new().suffix(&suffix).tempfile()?;

    let (bytes, _, had_errors) = to.encoding().encode(&text);
    if had_errors {
        return Err(EncodingError::Encode {
            encoding: to.label(),
            path: path.to_path_buf(),
        });
    }
    fs::write(temp.path(), bytes)?;
    Ok(temp)
}

use std::fmt::{self, Write};

/// Displays bytes as the contents of a protobuf string literal.
///
/// Valid UTF-8 is written through unchanged, apart from control characters and quotes. Anything
/// else is written as octal escapes.
pub(crate) struct Escaped<'a>(pub &'a [u8]);

impl<'a> fmt::Display for Escaped<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(self.0) {
            Ok(text) => {
                for ch in text.chars() {
                    match ch {
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        '\n' => f.write_str("\\n")?,
                        '\\' => f.write_str("\\\\")?,
                        '\'' => f.write_str("\\'")?,
                        '"' => f.write_str("\\\"")?,
                        ch if ch.is_ascii_control() => write!(f, "\\{:03o}", ch as u32)?,
                        ch => f.write_char(ch)?,
                    }
                }
            }
            Err(_) => {
                for &byte in self.0 {
                    match byte {
                        b'\t' => f.write_str("\\t")?,
                        b'\r' => f.write_str("\\r")?,
                        b'\n' => f.write_str("\\n")?,
                        b'\\' => f.write_str("\\\\")?,
                        b'\'' => f.write_str("\\'")?,
                        b'"' => f.write_str("\\\"")?,
                        b'\x20'..=b'\x7e' => f.write_char(byte as char)?,
                        _ => write!(f, "\\{:03o}", byte)?,
                    }
                }
            }
        }

        Ok(())
    }
}

/// Formats bytes as a double-quoted protobuf string literal.
pub(crate) fn quote(bytes: &[u8]) -> String {
    format!("\"{}\"", Escaped(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes() {
        assert_eq!(quote(b"plain"), "\"plain\"");
        assert_eq!(quote(b"tab\there"), "\"tab\\there\"");
        assert_eq!(quote(b"it's \"quoted\""), "\"it\\'s \\\"quoted\\\"\"");
        assert_eq!(quote("héllo".as_bytes()), "\"héllo\"");
        assert_eq!(quote(b"\x01\xff"), "\"\\001\\377\"");
        assert_eq!(quote(b"a\\b"), "\"a\\\\b\"");
    }
}

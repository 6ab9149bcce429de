//! Byte cursor shared by the signature and descriptor parsers

use crate::error::FormatError;

/// Bytes that terminate or structure identifiers in JVM signatures
const RESERVED: &[u8] = b".;[/<>:";

pub(crate) struct SignatureReader<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SignatureReader<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub(crate) fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Consume `byte` if it is next
    pub(crate) fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, byte: u8) -> Result<(), FormatError> {
        match self.peek() {
            Some(found) if found == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(self.error(format!(
                "expected '{}', found '{}'",
                byte as char, found as char
            ))),
            None => Err(self.error(format!("expected '{}', found end of input", byte as char))),
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Non-empty identifier ending right before one of `stops`.
    ///
    /// `/` is accepted inside the identifier when `allow_slash` is set (package
    /// qualified class names); any other reserved byte is an error.
    pub(crate) fn identifier(
        &mut self,
        stops: &[u8],
        allow_slash: bool,
    ) -> Result<&'a str, FormatError> {
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated identifier")),
                Some(byte) if stops.contains(&byte) => break,
                Some(b'/') if allow_slash => self.pos += 1,
                Some(byte) if RESERVED.contains(&byte) => {
                    return Err(self.error(format!("unexpected '{}' in identifier", byte as char)));
                }
                Some(_) => self.pos += 1,
            }
        }
        if self.pos == start {
            return Err(self.error("empty identifier"));
        }
        // Stops and reserved bytes are ASCII, so both ends sit on char boundaries.
        Ok(&self.input[start..self.pos])
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> FormatError {
        FormatError::new(self.input, self.pos, message)
    }
}

/// Source keyword for a primitive descriptor tag; `V` is not a field type
pub(crate) const fn primitive_name(tag: u8) -> Option<&'static str> {
    Some(match tag {
        b'B' => "byte",
        b'C' => "char",
        b'D' => "double",
        b'F' => "float",
        b'I' => "int",
        b'J' => "long",
        b'S' => "short",
        b'Z' => "boolean",
        _ => return None,
    })
}

/// `java/util/Map` to `java.util.Map`
pub(crate) fn dotted(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_stops() {
        let mut reader = SignatureReader::new("java/util/List<TT;>;");
        assert_eq!(reader.identifier(b"<.;", true).unwrap(), "java/util/List");
        assert_eq!(reader.peek(), Some(b'<'));
    }

    #[test]
    fn test_identifier_rejects_reserved_bytes() {
        let mut reader = SignatureReader::new("T:V;");
        assert!(reader.identifier(b";", false).is_err());

        let mut reader = SignatureReader::new(";");
        let error = reader.identifier(b";", false).unwrap_err();
        assert_eq!(error.offset, 0);
        assert!(error.message.contains("empty"));
    }
}

//! Raw method descriptors, e.g. `(ILjava/lang/String;[J)V`

use super::ParsedMethod;
use super::reader::SignatureReader;
use super::reader::dotted;
use super::reader::primitive_name;
use crate::error::FormatError;
use crate::type_ref::TypeRef;

pub(crate) fn parse_method_descriptor(input: &str) -> Result<ParsedMethod, FormatError> {
    let mut reader = SignatureReader::new(input);
    reader.expect(b'(')?;

    let mut parameters = Vec::new();
    while !reader.eat(b')') {
        if reader.is_at_end() {
            return Err(reader.error("unterminated parameter list"));
        }
        parameters.push(field_type(&mut reader)?);
    }

    let return_type = if reader.eat(b'V') {
        TypeRef::void()
    } else {
        field_type(&mut reader)?
    };

    if !reader.is_at_end() {
        return Err(reader.error("trailing characters after return type"));
    }

    Ok(ParsedMethod {
        return_type,
        parameters,
        throws: Vec::new(),
        type_parameters: Vec::new(),
    })
}

fn field_type(reader: &mut SignatureReader<'_>) -> Result<TypeRef, FormatError> {
    let mut depth = 0u8;
    while reader.eat(b'[') {
        depth = depth
            .checked_add(1)
            .ok_or_else(|| reader.error("too many array dimensions"))?;
    }

    let tag = reader
        .bump()
        .ok_or_else(|| reader.error("missing field type"))?;
    let text = match tag {
        b'L' => {
            let name = reader.identifier(b";", true)?;
            reader.expect(b';')?;
            dotted(name)
        }
        _ => match primitive_name(tag) {
            Some(name) => name.to_string(),
            None => {
                return Err(reader.error(format!("unexpected descriptor tag '{}'", tag as char)));
            }
        },
    };
    Ok(TypeRef::new(text).with_array_depth(depth))
}

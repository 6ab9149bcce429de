//! Generic method signatures as stored in the `Signature` attribute.
//!
//! ```text
//! MethodSignature := [TypeParameters] '(' JavaType* ')' (JavaType | 'V') ('^' ThrowsType)*
//! TypeParameter   := Identifier ':' [ReferenceType] (':' ReferenceType)*
//! ReferenceType   := ClassType | 'T' Identifier ';' | '[' JavaType
//! ClassType       := 'L' Identifier [TypeArgs] ('.' Identifier [TypeArgs])* ';'
//! TypeArg         := '*' | ['+' | '-'] ReferenceType
//! ```

use super::ParsedMethod;
use super::TypeParameter;
use super::reader::SignatureReader;
use super::reader::dotted;
use super::reader::primitive_name;
use crate::error::FormatError;
use crate::type_ref::TypeRef;

pub(crate) fn parse_method_signature(input: &str) -> Result<ParsedMethod, FormatError> {
    let mut reader = SignatureReader::new(input);

    let type_parameters = if reader.peek() == Some(b'<') {
        type_parameters(&mut reader)?
    } else {
        Vec::new()
    };

    reader.expect(b'(')?;
    let mut parameters = Vec::new();
    while !reader.eat(b')') {
        if reader.is_at_end() {
            return Err(reader.error("unterminated parameter list"));
        }
        parameters.push(java_type(&mut reader)?);
    }

    let return_type = if reader.eat(b'V') {
        TypeRef::void()
    } else {
        java_type(&mut reader)?
    };

    let mut throws = Vec::new();
    while reader.eat(b'^') {
        let text = match reader.peek() {
            Some(b'L') => class_type(&mut reader)?,
            Some(b'T') => type_variable(&mut reader)?,
            _ => return Err(reader.error("expected class or type variable after '^'")),
        };
        throws.push(TypeRef::new(text));
    }

    if !reader.is_at_end() {
        return Err(reader.error("trailing characters after method signature"));
    }

    Ok(ParsedMethod {
        return_type,
        parameters,
        throws,
        type_parameters,
    })
}

fn type_parameters(reader: &mut SignatureReader<'_>) -> Result<Vec<TypeParameter>, FormatError> {
    reader.expect(b'<')?;
    let mut params = Vec::new();
    while !reader.eat(b'>') {
        let name = reader.identifier(b":", false)?.to_string();
        reader.expect(b':')?;

        let mut bounds = Vec::new();
        // Class bound may be empty when only interface bounds follow
        if matches!(reader.peek(), Some(b'L' | b'T' | b'[')) {
            bounds.push(reference_type(reader)?);
        }
        while reader.eat(b':') {
            bounds.push(reference_type(reader)?);
        }
        params.push(TypeParameter { name, bounds });
    }
    if params.is_empty() {
        return Err(reader.error("empty type parameter list"));
    }
    Ok(params)
}

fn java_type(reader: &mut SignatureReader<'_>) -> Result<TypeRef, FormatError> {
    let mut depth = 0u8;
    while reader.eat(b'[') {
        depth = depth
            .checked_add(1)
            .ok_or_else(|| reader.error("too many array dimensions"))?;
    }

    let text = match reader.peek() {
        Some(b'L') => class_type(reader)?,
        Some(b'T') => type_variable(reader)?,
        Some(tag) => match primitive_name(tag) {
            Some(name) => {
                reader.bump();
                name.to_string()
            }
            None => return Err(reader.error(format!("unexpected type tag '{}'", tag as char))),
        },
        None => return Err(reader.error("missing type")),
    };
    Ok(TypeRef::new(text).with_array_depth(depth))
}

/// Reference type rendered to text; primitives are only valid as array elements
fn reference_type(reader: &mut SignatureReader<'_>) -> Result<String, FormatError> {
    match reader.peek() {
        Some(b'L') => class_type(reader),
        Some(b'T') => type_variable(reader),
        Some(b'[') => java_type(reader).map(|ty| ty.to_string()),
        _ => Err(reader.error("expected reference type")),
    }
}

fn type_variable(reader: &mut SignatureReader<'_>) -> Result<String, FormatError> {
    reader.expect(b'T')?;
    let name = reader.identifier(b";", false)?.to_string();
    reader.expect(b';')?;
    Ok(name)
}

fn class_type(reader: &mut SignatureReader<'_>) -> Result<String, FormatError> {
    reader.expect(b'L')?;
    let mut text = dotted(reader.identifier(b"<.;", true)?);
    loop {
        if reader.peek() == Some(b'<') {
            text.push_str(&type_arguments(reader)?);
        }
        if reader.eat(b'.') {
            text.push('.');
            text.push_str(reader.identifier(b"<.;", false)?);
        } else {
            reader.expect(b';')?;
            return Ok(text);
        }
    }
}

fn type_arguments(reader: &mut SignatureReader<'_>) -> Result<String, FormatError> {
    reader.expect(b'<')?;
    let mut args = Vec::new();
    while !reader.eat(b'>') {
        let arg = match reader.peek() {
            Some(b'*') => {
                reader.bump();
                "?".to_string()
            }
            Some(b'+') => {
                reader.bump();
                format!("? extends {}", reference_type(reader)?)
            }
            Some(b'-') => {
                reader.bump();
                format!("? super {}", reference_type(reader)?)
            }
            _ => reference_type(reader)?,
        };
        args.push(arg);
    }
    if args.is_empty() {
        return Err(reader.error("empty type argument list"));
    }
    Ok(format!("<{}>", args.join(",")))
}

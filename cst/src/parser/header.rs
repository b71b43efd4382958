use crate::block::field::Field;
use crate::parser::line::Header;

/// Parse a marker's attribute list into fields.
///
/// Attributes are `;`-separated and each must contain exactly one `:`.
/// The error string describes the first offending attribute.
pub fn parse_fields(header: Header<'_>) -> Result<Vec<Field>, String> {
    if !header.closed {
        return Err("missing closing parenthesis".to_string());
    }

    header
        .attributes
        .split(';')
        .enumerate()
        .map(|(idx, attribute)| {
            let mut parts = attribute.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(value), None) => Ok(Field::new(name, value)),
                _ => Err(format!(
                    "attribute #{} `{}` is not a `name:value` pair",
                    idx, attribute
                )),
            }
        })
        .collect()
}

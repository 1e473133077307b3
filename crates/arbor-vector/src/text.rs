//! Text form: `[1, 2.5e1, -3]`.

use crate::{Result, Vector, VectorError, VectorType, MAX_DIMS};

fn parse_error(pos: usize, reason: &str) -> VectorError {
    VectorError::Parse {
        pos,
        reason: reason.into(),
    }
}

/// Parses vector text into components.
///
/// Errors carry the byte offset of the offending character. Only float32 and
/// float64 are valid text targets; quantized encodings are produced by
/// conversion, not parsing.
fn parse_components(text: &str) -> Result<Vec<f64>> {
    let bytes = text.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    if pos == bytes.len() || bytes[pos] != b'[' {
        return Err(parse_error(pos, "expected '['"));
    }
    pos += 1;

    let mut components = Vec::new();
    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos < bytes.len() && bytes[pos] == b']' && components.is_empty() {
            pos += 1;
            break;
        }

        let start = pos;
        while pos < bytes.len() && !matches!(bytes[pos], b',' | b']') && !bytes[pos].is_ascii_whitespace()
        {
            pos += 1;
        }
        let component: f64 = text[start..pos]
            .parse()
            .map_err(|_| parse_error(start, "invalid number"))?;
        components.push(component);
        if components.len() > MAX_DIMS {
            return Err(parse_error(start, "too many components"));
        }

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos) {
            Some(b',') => pos += 1,
            Some(b']') => {
                pos += 1;
                break;
            }
            _ => return Err(parse_error(pos, "expected ',' or ']'")),
        }
    }

    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    if pos != bytes.len() {
        return Err(parse_error(pos, "trailing characters after ']'"));
    }
    if components.is_empty() {
        return Err(parse_error(0, "vector must have at least one component"));
    }
    Ok(components)
}

impl Vector {
    /// Parses `[x, y, ...]` text into a float32 or float64 vector.
    pub fn from_text(vtype: VectorType, text: &str) -> Result<Self> {
        let components = parse_components(text)?;
        match vtype {
            VectorType::Float32 => Ok(Vector::Float32(
                components.iter().map(|&c| c as f32).collect(),
            )),
            VectorType::Float64 => Ok(Vector::Float64(components)),
            _ => Err(VectorError::InvalidArgument(format!(
                "cannot parse text into {vtype:?}; parse as float32 or float64 and convert"
            ))),
        }
    }

    /// Renders a float32 or float64 vector back to its text form.
    pub fn to_text(&self) -> Result<String> {
        let mut out = String::from("[");
        match self {
            Vector::Float32(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&v.to_string());
                }
            }
            Vector::Float64(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&v.to_string());
                }
            }
            _ => {
                return Err(VectorError::InvalidArgument(format!(
                    "{:?} vectors have no text form",
                    self.vector_type()
                )))
            }
        }
        out.push(']');
        Ok(out)
    }
}

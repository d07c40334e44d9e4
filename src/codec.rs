//! Binary encode/decode helpers for the reference [`crate::reader`]/[`crate::writer`] wire
//! format. Not part of the CTF standard — a small reference codec stands in for a real CTF
//! binary decoder here.

use crate::schema::{FieldType, FieldValue, FieldValues, Layout};
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("buffer underrun decoding field '{0}'")]
    Underrun(String),

    #[error("field '{0}' is missing a value to encode")]
    MissingValue(String),

    #[error("field '{0}' has a value of the wrong type for its layout")]
    TypeMismatch(String),
}

pub fn encode_layout(
    layout: &Layout,
    values: &FieldValues,
    out: &mut BytesMut,
) -> Result<(), CodecError> {
    for field in layout {
        let value = values
            .get(&field.name)
            .ok_or_else(|| CodecError::MissingValue(field.name.clone()))?;
        match (&field.ty, value) {
            (FieldType::UInt { bits: 8, .. }, FieldValue::UInt(v)) => out.put_u8(*v as u8),
            (FieldType::UInt { bits: 16, .. }, FieldValue::UInt(v)) => out.put_u16_le(*v as u16),
            (FieldType::UInt { bits: 32, .. }, FieldValue::UInt(v)) => out.put_u32_le(*v as u32),
            (FieldType::UInt { bits: 64, .. }, FieldValue::UInt(v)) => out.put_u64_le(*v),
            (FieldType::Int { bits: 8 }, FieldValue::Int(v)) => out.put_i8(*v as i8),
            (FieldType::Int { bits: 16 }, FieldValue::Int(v)) => out.put_i16_le(*v as i16),
            (FieldType::Int { bits: 32 }, FieldValue::Int(v)) => out.put_i32_le(*v as i32),
            (FieldType::Int { bits: 64 }, FieldValue::Int(v)) => out.put_i64_le(*v),
            (FieldType::Str, FieldValue::Str(s)) => {
                out.put_u32_le(s.len() as u32);
                out.put_slice(s.as_bytes());
            }
            (FieldType::UInt { .. }, _) | (FieldType::Int { .. }, _) => {
                return Err(CodecError::TypeMismatch(field.name.clone()))
            }
            _ => return Err(CodecError::TypeMismatch(field.name.clone())),
        }
    }
    Ok(())
}

pub fn decode_layout(layout: &Layout, buf: &mut Bytes) -> Result<FieldValues, CodecError> {
    let mut values = FieldValues::new();
    for field in layout {
        let value = match field.ty {
            FieldType::UInt { bits: 8, .. } => {
                require(buf, 1, &field.name)?;
                FieldValue::UInt(buf.get_u8() as u64)
            }
            FieldType::UInt { bits: 16, .. } => {
                require(buf, 2, &field.name)?;
                FieldValue::UInt(buf.get_u16_le() as u64)
            }
            FieldType::UInt { bits: 32, .. } => {
                require(buf, 4, &field.name)?;
                FieldValue::UInt(buf.get_u32_le() as u64)
            }
            FieldType::UInt { bits: 64, .. } => {
                require(buf, 8, &field.name)?;
                FieldValue::UInt(buf.get_u64_le())
            }
            FieldType::UInt { bits, .. } => {
                return Err(CodecError::TypeMismatch(format!(
                    "{} (unsupported width {bits})",
                    field.name
                )))
            }
            FieldType::Int { bits: 8 } => {
                require(buf, 1, &field.name)?;
                FieldValue::Int(buf.get_i8() as i64)
            }
            FieldType::Int { bits: 16 } => {
                require(buf, 2, &field.name)?;
                FieldValue::Int(buf.get_i16_le() as i64)
            }
            FieldType::Int { bits: 32 } => {
                require(buf, 4, &field.name)?;
                FieldValue::Int(buf.get_i32_le() as i64)
            }
            FieldType::Int { bits: 64 } => {
                require(buf, 8, &field.name)?;
                FieldValue::Int(buf.get_i64_le())
            }
            FieldType::Int { bits } => {
                return Err(CodecError::TypeMismatch(format!(
                    "{} (unsupported width {bits})",
                    field.name
                )))
            }
            FieldType::Str => {
                require(buf, 4, &field.name)?;
                let len = buf.get_u32_le() as usize;
                require(buf, len, &field.name)?;
                let bytes = buf.copy_to_bytes(len);
                FieldValue::Str(String::from_utf8_lossy(&bytes).into_owned())
            }
        };
        values.insert(field.name.clone(), value);
    }
    Ok(values)
}

fn require(buf: &Bytes, n: usize, field_name: &str) -> Result<(), CodecError> {
    if buf.remaining() < n {
        Err(CodecError::Underrun(field_name.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    #[test]
    fn round_trips_mixed_layout() {
        let layout = vec![
            FieldSpec {
                name: "a".into(),
                ty: FieldType::UInt { bits: 64, clock: None },
            },
            FieldSpec {
                name: "b".into(),
                ty: FieldType::Int { bits: 32 },
            },
            FieldSpec {
                name: "c".into(),
                ty: FieldType::Str,
            },
        ];
        let mut values = FieldValues::new();
        values.insert("a".into(), FieldValue::UInt(42));
        values.insert("b".into(), FieldValue::Int(-7));
        values.insert("c".into(), FieldValue::Str("hi".into()));

        let mut buf = BytesMut::new();
        encode_layout(&layout, &values, &mut buf).unwrap();
        let mut bytes = buf.freeze();
        let decoded = decode_layout(&layout, &mut bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn underrun_is_an_error() {
        let layout = vec![FieldSpec {
            name: "a".into(),
            ty: FieldType::UInt { bits: 64, clock: None },
        }];
        let mut bytes = Bytes::from_static(&[1, 2, 3]);
        assert!(decode_layout(&layout, &mut bytes).is_err());
    }
}

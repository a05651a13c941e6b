use bytes::{Buf, Bytes};
use crate::application::error::TransportError;
use super::traits::*;
use super::varint::{decode_unsigned, zigzag_decode};

/// 기본 파서 구현을 제공하는 구조체
#[derive(Debug, Default, Clone)]
pub struct BaseParser;

impl ByteParser for BaseParser {}

impl PrimitiveParser for BaseParser {
    fn parse_i8(&self, buf: &mut Bytes) -> Result<i8, TransportError> {
        self.ensure_remaining(buf, 1)?;
        Ok(buf.get_i8())
    }

    fn parse_i16(&self, buf: &mut Bytes) -> Result<i16, TransportError> {
        self.ensure_remaining(buf, 2)?;
        Ok(buf.get_i16())
    }

    fn parse_i32(&self, buf: &mut Bytes) -> Result<i32, TransportError> {
        self.ensure_remaining(buf, 4)?;
        Ok(buf.get_i32())
    }

    fn parse_i64(&self, buf: &mut Bytes) -> Result<i64, TransportError> {
        self.ensure_remaining(buf, 8)?;
        Ok(buf.get_i64())
    }

    fn parse_u32(&self, buf: &mut Bytes) -> Result<u32, TransportError> {
        self.ensure_remaining(buf, 4)?;
        Ok(buf.get_u32())
    }

    fn parse_bool(&self, buf: &mut Bytes) -> Result<bool, TransportError> {
        Ok(self.parse_i8(buf)? != 0)
    }
}

impl StringParser for BaseParser {
    fn parse_string(&self, buf: &mut Bytes) -> Result<String, TransportError> {
        self.parse_nullable_string(buf)?
            .ok_or_else(|| TransportError::Protocol("unexpected null string".to_string()))
    }

    fn parse_nullable_string(&self, buf: &mut Bytes) -> Result<Option<String>, TransportError> {
        let len = self.parse_i16(buf)?;
        if len < 0 {
            return Ok(None);
        }
        let len = len as usize;

        self.ensure_remaining(buf, len)?;
        let bytes = buf.split_to(len);

        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|e| TransportError::Protocol(format!("invalid UTF-8 sequence: {}", e)))
    }

    fn parse_nullable_bytes(&self, buf: &mut Bytes) -> Result<Option<Bytes>, TransportError> {
        let len = self.parse_i32(buf)?;
        if len < 0 {
            return Ok(None);
        }
        let len = len as usize;

        self.ensure_remaining(buf, len)?;
        Ok(Some(buf.split_to(len)))
    }
}

impl ArrayParser for BaseParser {
    fn parse_array<T, F>(&self, buf: &mut Bytes, parser: F) -> Result<Vec<T>, TransportError>
    where
        F: Fn(&mut Bytes) -> Result<T, TransportError>,
    {
        Ok(self.parse_nullable_array(buf, parser)?.unwrap_or_default())
    }

    fn parse_nullable_array<T, F>(&self, buf: &mut Bytes, parser: F) -> Result<Option<Vec<T>>, TransportError>
    where
        F: Fn(&mut Bytes) -> Result<T, TransportError>,
    {
        let len = self.parse_i32(buf)?;
        if len < 0 {
            return Ok(None);
        }

        // 길이 필드를 믿지 말고 남은 바이트로 용량을 제한
        let mut items = Vec::with_capacity((len as usize).min(buf.remaining()));
        for _ in 0..len {
            items.push(parser(buf)?);
        }

        Ok(Some(items))
    }
}

impl VarIntParser for BaseParser {
    fn parse_varint(&self, buf: &mut Bytes) -> Result<i32, TransportError> {
        let value = self.parse_zigzag(buf, 5)?;
        i32::try_from(value)
            .map_err(|_| TransportError::Protocol(format!("varint out of range: {}", value)))
    }

    fn parse_varlong(&self, buf: &mut Bytes) -> Result<i64, TransportError> {
        self.parse_zigzag(buf, 10)
    }
}

impl BaseParser {
    fn parse_zigzag(&self, buf: &mut Bytes, max_bytes: usize) -> Result<i64, TransportError> {
        self.ensure_remaining(buf, 1)?;
        let (value, consumed) = decode_unsigned(buf.chunk(), max_bytes).ok_or_else(|| {
            TransportError::Protocol(format!("invalid varint encoding within {} bytes", max_bytes))
        })?;
        buf.advance(consumed);
        Ok(zigzag_decode(value))
    }
}

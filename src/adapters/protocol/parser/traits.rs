use bytes::{Buf, Bytes};
use crate::application::error::TransportError;

/// 바이트 스트림으로부터 데이터를 파싱하는 trait
pub trait ByteParser {
    /// 남은 바이트가 충분한지 확인
    fn ensure_remaining(&self, buf: &Bytes, required: usize) -> Result<(), TransportError> {
        if buf.remaining() < required {
            return Err(TransportError::Protocol(format!(
                "buffer too short: need {} bytes but has {}",
                required,
                buf.remaining()
            )));
        }
        Ok(())
    }
}

/// 기본 타입들의 파싱을 위한 trait
pub trait PrimitiveParser: ByteParser {
    fn parse_i8(&self, buf: &mut Bytes) -> Result<i8, TransportError>;
    fn parse_i16(&self, buf: &mut Bytes) -> Result<i16, TransportError>;
    fn parse_i32(&self, buf: &mut Bytes) -> Result<i32, TransportError>;
    fn parse_i64(&self, buf: &mut Bytes) -> Result<i64, TransportError>;
    fn parse_u32(&self, buf: &mut Bytes) -> Result<u32, TransportError>;
    fn parse_bool(&self, buf: &mut Bytes) -> Result<bool, TransportError>;
}

/// int16 길이 문자열과 int32 길이 바이트 파싱을 위한 trait
pub trait StringParser: ByteParser {
    fn parse_string(&self, buf: &mut Bytes) -> Result<String, TransportError>;
    fn parse_nullable_string(&self, buf: &mut Bytes) -> Result<Option<String>, TransportError>;
    fn parse_nullable_bytes(&self, buf: &mut Bytes) -> Result<Option<Bytes>, TransportError>;
}

/// int32 길이 배열 파싱을 위한 trait
pub trait ArrayParser: ByteParser {
    fn parse_array<T, F>(&self, buf: &mut Bytes, parser: F) -> Result<Vec<T>, TransportError>
    where
        F: Fn(&mut Bytes) -> Result<T, TransportError>;

    fn parse_nullable_array<T, F>(&self, buf: &mut Bytes, parser: F) -> Result<Option<Vec<T>>, TransportError>
    where
        F: Fn(&mut Bytes) -> Result<T, TransportError>;
}

/// 레코드 안의 zigzag 가변 정수 파싱을 위한 trait
pub trait VarIntParser: ByteParser {
    fn parse_varint(&self, buf: &mut Bytes) -> Result<i32, TransportError>;
    fn parse_varlong(&self, buf: &mut Bytes) -> Result<i64, TransportError>;
}

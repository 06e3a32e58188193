use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::LuaError;

type ReadResult<T> = Result<T, LuaError>;

pub struct ByteReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub async fn read_bytes(&mut self, n: usize) -> ReadResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf).await.map_err(|_| LuaError::UnexpectedEof)?;
        Ok(buf)
    }

    pub async fn read_byte(&mut self) -> ReadResult<u8> {
        self.inner.read_u8().await.map_err(|_| LuaError::UnexpectedEof)
    }

    pub async fn read_u32(&mut self) -> ReadResult<u32> {
        self.inner.read_u32_le().await.map_err(|_| LuaError::UnexpectedEof)
    }

    pub async fn read_u64(&mut self) -> ReadResult<u64> {
        self.inner.read_u64_le().await.map_err(|_| LuaError::UnexpectedEof)
    }

    pub async fn read_i64(&mut self) -> ReadResult<i64> {
        Ok(self.read_u64().await? as i64)
    }

    pub async fn read_f64(&mut self) -> ReadResult<f64> {
        let bits = self.read_u64().await?;
        Ok(f64::from_bits(bits))
    }

    // length byte 0 = empty, <0xFF reads L-1 bytes, 0xFF reads a u64 length then N-1 bytes
    pub async fn read_string(&mut self) -> ReadResult<Vec<u8>> {
        let len_byte = self.read_byte().await?;
        if len_byte == 0 {
            return Ok(Vec::new());
        }
        let len = if len_byte < 0xFF {
            (len_byte - 1) as u64
        } else {
            let n = self.read_u64().await?;
            if n == 0 || n > i64::MAX as u64 {
                return Err(LuaError::CorruptChunk("invalid long string length"));
            }
            n - 1
        };
        self.read_bytes(len as usize).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_primitive_widths() {
        let data: Vec<u8> = vec![
            0x01, // byte
            0x02, 0x00, 0x00, 0x00, // u32
            0x34, 0x12, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // u64
        ];
        let mut r = ByteReader::new(&data[..]);
        assert_eq!(r.read_byte().await.unwrap(), 1);
        assert_eq!(r.read_u32().await.unwrap(), 2);
        assert_eq!(r.read_u64().await.unwrap(), 0x1234);
    }

    #[tokio::test]
    async fn reads_short_and_empty_strings() {
        // empty: length byte 0
        let mut r = ByteReader::new(&[0u8][..]);
        assert_eq!(r.read_string().await.unwrap(), Vec::<u8>::new());

        // "hi": length byte 3 (2 chars + 1), then bytes
        let mut r = ByteReader::new(&[3u8, b'h', b'i'][..]);
        assert_eq!(r.read_string().await.unwrap(), b"hi".to_vec());
    }

    #[tokio::test]
    async fn unexpected_eof_on_short_read() {
        let mut r = ByteReader::new(&[0x01u8][..]);
        assert!(r.read_u32().await.is_err());
    }
}

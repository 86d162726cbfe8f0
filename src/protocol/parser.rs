use super::types::RespValue;
use crate::error::{Result, TribError};
use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

/// Internal outcome of a parse attempt over the buffered bytes.
enum Step<T> {
    Done(T),
    Incomplete,
}

/// Bail out of the enclosing parse function when more input is needed.
macro_rules! ready {
    ($e:expr) => {
        match $e? {
            Step::Done(v) => v,
            Step::Incomplete => return Ok(Step::Incomplete),
        }
    };
}

/// Incremental RESP reply reader.
///
/// Bytes are pushed in with [`feed`](Self::feed) as they arrive from the
/// socket; [`parse`](Self::parse) hands back one complete reply at a time and
/// leaves partial data buffered until the rest shows up.
pub struct RespParser {
    buffer: BytesMut,
}

impl RespParser {
    /// Create a new parser with a given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Add data to the parser buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of bytes fed but not yet consumed by a complete reply.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Try to parse a complete RESP value from the buffer.
    ///
    /// Returns `Ok(None)` when the buffer holds only part of a reply. Bytes
    /// that can never form a valid reply are a protocol error.
    pub fn parse(&mut self) -> Result<Option<RespValue>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&self.buffer[..]);
        match self.parse_value(&mut cursor)? {
            Step::Done(value) => {
                let pos = cursor.position() as usize;
                self.buffer.advance(pos);
                Ok(Some(value))
            }
            Step::Incomplete => Ok(None),
        }
    }

    fn parse_value(&self, cursor: &mut Cursor<&[u8]>) -> Result<Step<RespValue>> {
        if cursor.position() >= cursor.get_ref().len() as u64 {
            return Ok(Step::Incomplete);
        }

        let byte = cursor.get_ref()[cursor.position() as usize];
        cursor.set_position(cursor.position() + 1);

        match byte {
            b'+' => Ok(self.read_line(cursor)?.map(RespValue::SimpleString)),
            b'-' => Ok(self.read_line(cursor)?.map(RespValue::Error)),
            b':' => self.parse_integer(cursor),
            b'$' => self.parse_bulk_string(cursor),
            b'*' => self.parse_array(cursor),
            _ => Err(TribError::Protocol(format!(
                "Invalid RESP type marker: {:?}",
                byte as char
            ))),
        }
    }

    fn parse_integer(&self, cursor: &mut Cursor<&[u8]>) -> Result<Step<RespValue>> {
        let line = ready!(self.read_line(cursor));
        let num = line
            .parse::<i64>()
            .map_err(|_| TribError::Protocol(format!("Invalid integer: {}", line)))?;
        Ok(Step::Done(RespValue::Integer(num)))
    }

    fn parse_bulk_string(&self, cursor: &mut Cursor<&[u8]>) -> Result<Step<RespValue>> {
        let len = ready!(self.read_length(cursor, "bulk string"));
        let Some(len) = len else {
            return Ok(Step::Done(RespValue::BulkString(None)));
        };

        let pos = cursor.position() as usize;
        let data = cursor.get_ref();

        if pos + len + 2 > data.len() {
            return Ok(Step::Incomplete);
        }
        if &data[pos + len..pos + len + 2] != b"\r\n" {
            return Err(TribError::Protocol(
                "Bulk string not terminated by CRLF".to_string(),
            ));
        }

        let bytes = Bytes::copy_from_slice(&data[pos..pos + len]);
        cursor.set_position((pos + len + 2) as u64);

        Ok(Step::Done(RespValue::BulkString(Some(bytes))))
    }

    fn parse_array(&self, cursor: &mut Cursor<&[u8]>) -> Result<Step<RespValue>> {
        let len = ready!(self.read_length(cursor, "array"));
        let Some(len) = len else {
            return Ok(Step::Done(RespValue::Array(None)));
        };

        let mut array = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            array.push(ready!(self.parse_value(cursor)));
        }

        Ok(Step::Done(RespValue::Array(Some(array))))
    }

    /// Length header of a bulk string or array; `None` stands for `-1`.
    fn read_length(&self, cursor: &mut Cursor<&[u8]>, what: &str) -> Result<Step<Option<usize>>> {
        let line = ready!(self.read_line(cursor));
        let len = line
            .parse::<i64>()
            .map_err(|_| TribError::Protocol(format!("Invalid {} length: {}", what, line)))?;

        match len {
            -1 => Ok(Step::Done(None)),
            n if n < 0 => Err(TribError::Protocol(format!(
                "Invalid {} length: {}",
                what, n
            ))),
            n => Ok(Step::Done(Some(n as usize))),
        }
    }

    fn read_line(&self, cursor: &mut Cursor<&[u8]>) -> Result<Step<String>> {
        let start = cursor.position() as usize;
        let data = cursor.get_ref();

        if let Some(offset) = data[start..].windows(2).position(|w| w == b"\r\n") {
            let end = start + offset;
            let line = String::from_utf8_lossy(&data[start..end]).to_string();
            cursor.set_position((end + 2) as u64);
            return Ok(Step::Done(line));
        }

        Ok(Step::Incomplete)
    }
}

impl<T> Step<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Step<U> {
        match self {
            Step::Done(v) => Step::Done(f(v)),
            Step::Incomplete => Step::Incomplete,
        }
    }
}

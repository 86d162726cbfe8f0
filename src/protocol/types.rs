use crate::error::{Result, TribError};
use bytes::{BufMut, Bytes, BytesMut};

/// RESP (REdis Serialization Protocol) reply types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple String: +OK\r\n
    SimpleString(String),

    /// Error: -Error message\r\n
    Error(String),

    /// Integer: :1000\r\n
    Integer(i64),

    /// Bulk String: $6\r\nfoobar\r\n or $-1\r\n for null
    BulkString(Option<Bytes>),

    /// Array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n or *-1\r\n for null
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Create a simple string reply
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Create an error reply
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Create a bulk string reply
    pub fn bulk_string(s: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(s.into()))
    }

    /// Create an array reply
    pub fn array(arr: Vec<RespValue>) -> Self {
        RespValue::Array(Some(arr))
    }

    /// Textual payload of a simple or bulk string reply.
    ///
    /// `CLUSTER NODES`, `CLUSTER INFO` and `INFO` all answer with a bulk
    /// string; anything else is reported as an unexpected reply.
    pub fn into_text(self) -> Result<String> {
        match self {
            RespValue::SimpleString(s) => Ok(s),
            RespValue::BulkString(Some(b)) => String::from_utf8(b.to_vec())
                .map_err(|e| TribError::UnexpectedReply(format!("non UTF-8 bulk string: {}", e))),
            other => Err(TribError::UnexpectedReply(format!(
                "expected a string reply, got {}",
                other.type_name()
            ))),
        }
    }

    /// Short name of the reply type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            RespValue::SimpleString(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::BulkString(Some(_)) => "bulk string",
            RespValue::BulkString(None) => "null bulk string",
            RespValue::Array(Some(_)) => "array",
            RespValue::Array(None) => "null array",
        }
    }

    /// Serialize to RESP format bytes
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf);
        buf.freeze()
    }

    fn write_to(&self, buf: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => {
                buf.put_slice(format!("+{}\r\n", s).as_bytes());
            }
            RespValue::Error(e) => {
                buf.put_slice(format!("-{}\r\n", e).as_bytes());
            }
            RespValue::Integer(i) => {
                buf.put_slice(format!(":{}\r\n", i).as_bytes());
            }
            RespValue::BulkString(None) => buf.put_slice(b"$-1\r\n"),
            RespValue::BulkString(Some(s)) => {
                buf.put_slice(format!("${}\r\n", s.len()).as_bytes());
                buf.put_slice(s);
                buf.put_slice(b"\r\n");
            }
            RespValue::Array(None) => buf.put_slice(b"*-1\r\n"),
            RespValue::Array(Some(arr)) => {
                buf.put_slice(format!("*{}\r\n", arr.len()).as_bytes());
                for item in arr {
                    item.write_to(buf);
                }
            }
        }
    }
}

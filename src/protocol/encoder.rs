//! RESP request framing.
//!
//! Commands go out as a RESP array of bulk strings. Arguments are an explicit
//! [`Arg`] sum type, so every caller decides how a value hits the wire.

use bytes::{BufMut, Bytes, BytesMut};

/// Headers and small arguments are batched until the pending chunk grows past
/// this many bytes; larger arguments are written as their own chunk.
pub const CHUNK_FLUSH_THRESHOLD: usize = 6000;

const CRLF: &[u8] = b"\r\n";

/// One argument of a RESP command.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Bytes(Bytes),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Arg {
    /// Wire form of the argument, without framing.
    pub fn encode(&self) -> Bytes {
        match self {
            Arg::Bytes(b) => b.clone(),
            Arg::Int(i) => Bytes::from(i.to_string()),
            Arg::Float(f) => Bytes::from(format_float(*f)),
            Arg::Text(s) => Bytes::copy_from_slice(s.as_bytes()),
        }
    }
}

/// Shortest representation that parses back to the same `f64`.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f == f64::INFINITY {
        "inf".to_string()
    } else if f == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{:?}", f)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl From<&[u8]> for Arg {
    fn from(b: &[u8]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for Arg {
    fn from(b: Vec<u8>) -> Self {
        Arg::Bytes(Bytes::from(b))
    }
}

impl From<Bytes> for Arg {
    fn from(b: Bytes) -> Self {
        Arg::Bytes(b)
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}

impl From<i32> for Arg {
    fn from(i: i32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<u16> for Arg {
    fn from(i: u16) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<u32> for Arg {
    fn from(i: u32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<f64> for Arg {
    fn from(f: f64) -> Self {
        Arg::Float(f)
    }
}

/// Frame a command and its arguments as a list of chunks to write in order.
///
/// A command containing spaces (`"cluster nodes"`) contributes one array
/// element per word.
pub fn pack_command(command: &str, args: &[Arg]) -> Vec<Bytes> {
    let mut output = Vec::new();
    let tail = pack_into(&mut output, BytesMut::new(), command, args);
    output.push(tail.freeze());
    output
}

/// Frame several commands back to back for a pipelined write.
pub fn pack_commands(commands: &[(&str, Vec<Arg>)]) -> Vec<Bytes> {
    let mut output = Vec::new();
    let mut buff = BytesMut::new();
    for (command, args) in commands {
        buff = pack_into(&mut output, buff, command, args);
    }
    output.push(buff.freeze());
    output
}

/// Append one command to `buff`, moving finished chunks into `output`.
/// Returns the still-open trailing chunk.
fn pack_into(output: &mut Vec<Bytes>, mut buff: BytesMut, command: &str, args: &[Arg]) -> BytesMut {
    let words: Vec<Bytes> = command
        .split_whitespace()
        .map(|w| Bytes::copy_from_slice(w.as_bytes()))
        .collect();
    let argc = words.len() + args.len();

    buff.put_slice(format!("*{}\r\n", argc).as_bytes());

    for arg in words.into_iter().chain(args.iter().map(Arg::encode)) {
        buff.put_slice(format!("${}\r\n", arg.len()).as_bytes());
        if buff.len() > CHUNK_FLUSH_THRESHOLD || arg.len() > CHUNK_FLUSH_THRESHOLD {
            output.push(buff.split().freeze());
            output.push(arg);
            buff.put_slice(CRLF);
        } else {
            buff.put_slice(&arg);
            buff.put_slice(CRLF);
        }
    }

    buff
}

pub fn cmd_ping() -> Vec<Bytes> {
    pack_command("ping", &[])
}

pub fn cmd_info() -> Vec<Bytes> {
    pack_command("info", &[])
}

pub fn cmd_cluster_nodes() -> Vec<Bytes> {
    pack_command("cluster nodes", &[])
}

pub fn cmd_cluster_info() -> Vec<Bytes> {
    pack_command("cluster info", &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(chunks: &[Bytes]) -> Vec<u8> {
        chunks.iter().flat_map(|c| c.iter().copied()).collect()
    }

    #[test]
    fn test_encode_args() {
        assert_eq!(Arg::from("héllo").encode(), Bytes::from("héllo"));
        assert_eq!(Arg::from(-42i64).encode(), Bytes::from("-42"));
        assert_eq!(Arg::from(0.1f64).encode(), Bytes::from("0.1"));
        assert_eq!(Arg::from(3.0f64).encode(), Bytes::from("3.0"));
        assert_eq!(Arg::from(f64::NEG_INFINITY).encode(), Bytes::from("-inf"));
        assert_eq!(
            Arg::from(vec![0u8, 255]).encode(),
            Bytes::from_static(&[0u8, 255])
        );
    }

    #[test]
    fn test_float_keeps_precision() {
        let value = 1.0f64 / 3.0;
        let encoded = Arg::from(value).encode();
        let parsed: f64 = std::str::from_utf8(&encoded).unwrap().parse().unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_pack_splits_spaced_command() {
        let chunks = cmd_cluster_nodes();
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0],
            Bytes::from("*2\r\n$7\r\ncluster\r\n$5\r\nnodes\r\n")
        );
    }

    #[test]
    fn test_pack_with_args() {
        let chunks = pack_command(
            "cluster setslot",
            &[Arg::from(42u16), "node".into(), Arg::from("abc")],
        );
        assert_eq!(
            joined(&chunks),
            b"*5\r\n$7\r\ncluster\r\n$7\r\nsetslot\r\n$2\r\n42\r\n$4\r\nnode\r\n$3\r\nabc\r\n"
        );
    }

    #[test]
    fn test_large_argument_gets_own_chunk() {
        let big = vec![b'x'; CHUNK_FLUSH_THRESHOLD + 1];
        let chunks = pack_command("set", &["k".into(), Arg::from(big.clone())]);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], Bytes::from("*3\r\n$3\r\nset\r\n$1\r\nk\r\n$6001\r\n"));
        assert_eq!(chunks[1], Bytes::from(big));
        assert_eq!(chunks[2], Bytes::from("\r\n"));
    }

    #[test]
    fn test_buffer_flushes_when_header_grows() {
        let args: Vec<Arg> = (0..2000).map(|i| Arg::from(format!("a{}", i))).collect();
        let chunks = pack_command("del", &args);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= CHUNK_FLUSH_THRESHOLD + 64));
        let wire = joined(&chunks);
        assert!(wire.starts_with(b"*2001\r\n$3\r\ndel\r\n"));
        assert!(wire.ends_with(b"$5\r\na1999\r\n"));
    }

    #[test]
    fn test_pack_pipeline() {
        let chunks = pack_commands(&[("ping", vec![]), ("echo", vec!["hi".into()])]);
        assert_eq!(
            joined(&chunks),
            b"*1\r\n$4\r\nping\r\n*2\r\n$4\r\necho\r\n$2\r\nhi\r\n"
        );
    }
}

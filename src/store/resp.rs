//! RESP2 wire codec
//!
//! Encodes commands and decodes replies for the Redis serialization
//! protocol, version 2:
//! - Simple Strings (+)
//! - Errors (-)
//! - Integers (:)
//! - Bulk Strings ($)
//! - Arrays (*)
//! - Null (`$-1` or `*-1`)

use bytes::Bytes;

/// Maximum nesting depth for arrays.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Maximum bulk string size (512MB).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array elements.
pub const MAX_ELEMENTS: usize = 1_000_000;

// == RESP Value ==
/// A decoded RESP2 value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    Null,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Builds a bulk string from anything byte-like.
    pub fn bulk(data: impl AsRef<[u8]>) -> Self {
        RespValue::BulkString(Bytes::copy_from_slice(data.as_ref()))
    }
}

/// Parse result.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseResult {
    /// Parsed a value and consumed the given number of bytes.
    Ok(RespValue, usize),
    /// Need more data.
    Incomplete,
    /// Malformed input.
    Error(String),
}

// == Encoding ==
/// Encodes a command as an array of bulk strings.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A]) -> Vec<u8> {
    let payload: usize = args.iter().map(|a| a.as_ref().len() + 16).sum();
    let mut buf = Vec::with_capacity(16 + payload);
    buf.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        write_bulk(&mut buf, arg.as_ref());
    }
    buf
}

/// Encodes a value into RESP2 bytes.
pub fn encode(value: &RespValue) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_into(&mut buf, value);
    buf
}

fn encode_into(buf: &mut Vec<u8>, value: &RespValue) {
    match value {
        RespValue::SimpleString(s) => {
            buf.push(b'+');
            buf.extend_from_slice(s.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        RespValue::Error(msg) => {
            buf.push(b'-');
            buf.extend_from_slice(msg.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        RespValue::Integer(n) => {
            buf.extend_from_slice(format!(":{}\r\n", n).as_bytes());
        }
        RespValue::BulkString(data) => write_bulk(buf, data),
        RespValue::Null => buf.extend_from_slice(b"$-1\r\n"),
        RespValue::Array(items) => {
            buf.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                encode_into(buf, item);
            }
        }
    }
}

fn write_bulk(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}

// == Parsing ==
/// Parses one value from the start of `data`.
pub fn parse(data: &[u8]) -> ParseResult {
    parse_value(data, 0)
}

fn parse_value(data: &[u8], depth: usize) -> ParseResult {
    let Some(&prefix) = data.first() else {
        return ParseResult::Incomplete;
    };

    if depth > MAX_NESTING_DEPTH {
        return ParseResult::Error("maximum nesting depth exceeded".to_string());
    }

    let Some(line_len) = find_crlf(&data[1..]) else {
        return ParseResult::Incomplete;
    };
    let line = &data[1..1 + line_len];
    // prefix + line + CRLF
    let header_len = line_len + 3;

    match prefix {
        b'+' => ParseResult::Ok(
            RespValue::SimpleString(String::from_utf8_lossy(line).into_owned()),
            header_len,
        ),
        b'-' => ParseResult::Ok(
            RespValue::Error(String::from_utf8_lossy(line).into_owned()),
            header_len,
        ),
        b':' => match parse_integer(line) {
            Some(n) => ParseResult::Ok(RespValue::Integer(n), header_len),
            None => ParseResult::Error("invalid integer".to_string()),
        },
        b'$' => parse_bulk_string(data, line, header_len),
        b'*' => parse_array(data, line, header_len, depth),
        other => ParseResult::Error(format!("unexpected type byte {:?}", other as char)),
    }
}

fn parse_bulk_string(data: &[u8], line: &[u8], header_len: usize) -> ParseResult {
    match parse_integer(line) {
        Some(-1) => ParseResult::Ok(RespValue::Null, header_len),
        Some(len) if len >= 0 => {
            let len = len as usize;
            if len > MAX_BULK_SIZE {
                return ParseResult::Error(format!(
                    "bulk string too large: {} > {}",
                    len, MAX_BULK_SIZE
                ));
            }

            let data_end = header_len + len;
            if data.len() < data_end + 2 {
                return ParseResult::Incomplete;
            }
            if &data[data_end..data_end + 2] != b"\r\n" {
                return ParseResult::Error("missing CRLF after bulk string".to_string());
            }

            ParseResult::Ok(
                RespValue::BulkString(Bytes::copy_from_slice(&data[header_len..data_end])),
                data_end + 2,
            )
        }
        _ => ParseResult::Error("invalid bulk string length".to_string()),
    }
}

fn parse_array(data: &[u8], line: &[u8], header_len: usize, depth: usize) -> ParseResult {
    match parse_integer(line) {
        Some(-1) => ParseResult::Ok(RespValue::Null, header_len),
        Some(len) if len >= 0 => {
            let len = len as usize;
            if len > MAX_ELEMENTS {
                return ParseResult::Error(format!("array too large: {} > {}", len, MAX_ELEMENTS));
            }

            let mut items = Vec::with_capacity(len);
            let mut offset = header_len;
            for _ in 0..len {
                match parse_value(&data[offset..], depth + 1) {
                    ParseResult::Ok(item, consumed) => {
                        items.push(item);
                        offset += consumed;
                    }
                    incomplete_or_error => return incomplete_or_error,
                }
            }

            ParseResult::Ok(RespValue::Array(items), offset)
        }
        _ => ParseResult::Error("invalid array length".to_string()),
    }
}

fn parse_integer(line: &[u8]) -> Option<i64> {
    std::str::from_utf8(line).ok()?.parse().ok()
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

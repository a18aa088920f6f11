//! Series schema and value types with their wire encodings
//!
//! Query responses and schema pulls use a fixed hand-framed layout rather
//! than the general serializer: a single data-type ordinal byte heads a
//! batch of time-value pairs, and schema batches are length-prefixed with a
//! 32-bit big-endian count. Everything here is big-endian.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Value type of a series, encoded on the wire as its ordinal byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TsDataType {
    Boolean,
    Int32,
    Int64,
    Float,
    Double,
    Text,
}

impl TsDataType {
    pub fn ordinal(self) -> u8 {
        match self {
            TsDataType::Boolean => 0,
            TsDataType::Int32 => 1,
            TsDataType::Int64 => 2,
            TsDataType::Float => 3,
            TsDataType::Double => 4,
            TsDataType::Text => 5,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Result<Self, CodecError> {
        Ok(match ordinal {
            0 => TsDataType::Boolean,
            1 => TsDataType::Int32,
            2 => TsDataType::Int64,
            3 => TsDataType::Float,
            4 => TsDataType::Double,
            5 => TsDataType::Text,
            other => return Err(CodecError::UnknownDataType(other)),
        })
    }
}

/// Column encoding of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TsEncoding {
    Plain,
    Rle,
    TwoDiff,
    Gorilla,
}

impl TsEncoding {
    pub fn ordinal(self) -> u8 {
        match self {
            TsEncoding::Plain => 0,
            TsEncoding::Rle => 1,
            TsEncoding::TwoDiff => 2,
            TsEncoding::Gorilla => 3,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Result<Self, CodecError> {
        Ok(match ordinal {
            0 => TsEncoding::Plain,
            1 => TsEncoding::Rle,
            2 => TsEncoding::TwoDiff,
            3 => TsEncoding::Gorilla,
            other => return Err(CodecError::UnknownEncoding(other)),
        })
    }
}

/// A single point value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TsValue {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Text(String),
}

impl TsValue {
    pub fn data_type(&self) -> TsDataType {
        match self {
            TsValue::Boolean(_) => TsDataType::Boolean,
            TsValue::Int32(_) => TsDataType::Int32,
            TsValue::Int64(_) => TsDataType::Int64,
            TsValue::Float(_) => TsDataType::Float,
            TsValue::Double(_) => TsDataType::Double,
            TsValue::Text(_) => TsDataType::Text,
        }
    }

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        match self {
            TsValue::Boolean(v) => buf.put_u8(*v as u8),
            TsValue::Int32(v) => buf.put_i32(*v),
            TsValue::Int64(v) => buf.put_i64(*v),
            TsValue::Float(v) => buf.put_f32(*v),
            TsValue::Double(v) => buf.put_f64(*v),
            TsValue::Text(v) => {
                buf.put_u32(v.len() as u32);
                buf.put_slice(v.as_bytes());
            }
        }
    }

    pub fn decode_from(data_type: TsDataType, buf: &mut impl Buf) -> Result<Self, CodecError> {
        let need = |buf: &mut dyn Buf, n: usize| -> Result<(), CodecError> {
            if buf.remaining() < n {
                Err(CodecError::Underflow("value"))
            } else {
                Ok(())
            }
        };
        Ok(match data_type {
            TsDataType::Boolean => {
                need(buf, 1)?;
                TsValue::Boolean(buf.get_u8() != 0)
            }
            TsDataType::Int32 => {
                need(buf, 4)?;
                TsValue::Int32(buf.get_i32())
            }
            TsDataType::Int64 => {
                need(buf, 8)?;
                TsValue::Int64(buf.get_i64())
            }
            TsDataType::Float => {
                need(buf, 4)?;
                TsValue::Float(buf.get_f32())
            }
            TsDataType::Double => {
                need(buf, 8)?;
                TsValue::Double(buf.get_f64())
            }
            TsDataType::Text => {
                need(buf, 4)?;
                let len = buf.get_u32() as usize;
                need(buf, len)?;
                let mut bytes = vec![0u8; len];
                buf.copy_to_slice(&mut bytes);
                TsValue::Text(
                    String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8("text value"))?,
                )
            }
        })
    }
}

/// A timestamped point value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeValuePair {
    pub timestamp: i64,
    pub value: TsValue,
}

impl TimeValuePair {
    pub fn new(timestamp: i64, value: TsValue) -> Self {
        Self { timestamp, value }
    }
}

/// Encode a batch of pairs: u32 count, then (i64 timestamp, value) each.
///
/// All pairs in one batch share a data type; the type travels out of band
/// as the leading ordinal byte of the response buffer.
pub fn serialize_tv_pairs(pairs: &[TimeValuePair], buf: &mut impl BufMut) {
    buf.put_u32(pairs.len() as u32);
    for pair in pairs {
        buf.put_i64(pair.timestamp);
        pair.value.encode_into(buf);
    }
}

pub fn deserialize_tv_pairs(
    data_type: TsDataType,
    buf: &mut impl Buf,
) -> Result<Vec<TimeValuePair>, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Underflow("pair count"));
    }
    let count = buf.get_u32() as usize;
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        if buf.remaining() < 8 {
            return Err(CodecError::Underflow("timestamp"));
        }
        let timestamp = buf.get_i64();
        let value = TsValue::decode_from(data_type, &mut *buf)?;
        pairs.push(TimeValuePair::new(timestamp, value));
    }
    Ok(pairs)
}

/// Schema of a single measurement under a storage group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasurementSchema {
    /// Full series path, e.g. `root.vehicle.d0.s0`
    pub path: String,
    pub data_type: TsDataType,
    pub encoding: TsEncoding,
}

impl MeasurementSchema {
    pub fn new(path: impl Into<String>, data_type: TsDataType, encoding: TsEncoding) -> Self {
        Self {
            path: path.into(),
            data_type,
            encoding,
        }
    }

    /// Canonical encoding: u32 path length, path bytes, type ordinal,
    /// encoding ordinal.
    pub fn serialize_into(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.path.len() as u32);
        buf.put_slice(self.path.as_bytes());
        buf.put_u8(self.data_type.ordinal());
        buf.put_u8(self.encoding.ordinal());
    }

    pub fn deserialize_from(buf: &mut impl Buf) -> Result<Self, CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::Underflow("schema path length"));
        }
        let len = buf.get_u32() as usize;
        if buf.remaining() < len + 2 {
            return Err(CodecError::Underflow("schema body"));
        }
        let mut bytes = vec![0u8; len];
        buf.copy_to_slice(&mut bytes);
        let path =
            String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8("schema path"))?;
        let data_type = TsDataType::from_ordinal(buf.get_u8())?;
        let encoding = TsEncoding::from_ordinal(buf.get_u8())?;
        Ok(Self {
            path,
            data_type,
            encoding,
        })
    }

    /// Storage group of the series: the first two dotted segments.
    pub fn storage_group(&self) -> &str {
        match self.path.match_indices('.').nth(1) {
            Some((i, _)) => &self.path[..i],
            None => &self.path,
        }
    }
}

/// Inclusive time-range filter attached to a series query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFilter {
    pub start: i64,
    pub end: i64,
}

impl TimeFilter {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn satisfies(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

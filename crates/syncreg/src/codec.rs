// Path: crates/syncreg/src/codec.rs

//! The compact binary format of a persisted registry.
//!
//! ```text
//! Registry record:
//!   u32 (big-endian)  format signature 0xC0BE50FF
//!   u8                all_synchronized (0 or 1)
//!   varint            bucket_count (1..=100, equal to the configured max dimensionality)
//!   bucket_count x    DimensionBucket record, for dimensionality 1..=bucket_count
//!
//! DimensionBucket record:
//!   varint            dimensions
//!   varint            cube_count   (< 10_000)
//!   varint            value_count  (< 100_000)
//!   cube_count * dimensions       string  attribute ids
//!   cube_count * dimensions * 4   svarint value index
//!   value_count                   svarint values
//! ```
//!
//! `varint` is LEB128; `svarint` is a zigzag-mapped LEB128 so that the `-1`
//! markers of the value index and negative values stay short. A string is a
//! varint `len + 1` followed by `len` UTF-8 bytes, with `0` meaning "absent".

use crate::bucket::DimensionBucket;
use crate::error::FormatError;
use bytes::{Buf, BufMut};

/// Leading signature of every persisted registry.
pub const FORMAT_SIGNATURE: u32 = 0xC0BE_50FF;

/// Upper bound on the number of bucket records a stream may declare.
pub const MAX_BUCKETS: u64 = 100;

pub(crate) fn put_varint(buf: &mut impl BufMut, value: u64) {
    prost::encoding::encode_varint(value, buf);
}

pub(crate) fn get_varint(buf: &mut impl Buf) -> Result<u64, FormatError> {
    if !buf.has_remaining() {
        return Err(FormatError::UnexpectedEof);
    }
    prost::encoding::decode_varint(buf).map_err(|e| FormatError::Varint(e.to_string()))
}

/// Maps signed integers onto unsigned ones: 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...
#[inline]
fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ (-((value & 1) as i64))
}

pub(crate) fn put_svarint(buf: &mut impl BufMut, value: i64) {
    put_varint(buf, zigzag_encode(value));
}

pub(crate) fn get_svarint(buf: &mut impl Buf) -> Result<i64, FormatError> {
    get_varint(buf).map(zigzag_decode)
}

pub(crate) fn get_i32(buf: &mut impl Buf) -> Result<i32, FormatError> {
    let value = get_svarint(buf)?;
    i32::try_from(value).map_err(|_| FormatError::Varint(format!("{value} does not fit in i32")))
}

pub(crate) fn put_string(buf: &mut impl BufMut, value: Option<&str>) {
    match value {
        None => put_varint(buf, 0),
        Some(s) => {
            put_varint(buf, s.len() as u64 + 1);
            buf.put_slice(s.as_bytes());
        }
    }
}

pub(crate) fn get_string(buf: &mut impl Buf) -> Result<Option<String>, FormatError> {
    let marker = get_varint(buf)?;
    let Some(len) = marker.checked_sub(1) else {
        return Ok(None);
    };
    let len = usize::try_from(len).map_err(|_| FormatError::UnexpectedEof)?;
    if buf.remaining() < len {
        return Err(FormatError::UnexpectedEof);
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| FormatError::InvalidUtf8)
}

fn put_bool(buf: &mut impl BufMut, value: bool) {
    buf.put_u8(u8::from(value));
}

fn get_bool(buf: &mut impl Buf) -> Result<bool, FormatError> {
    if !buf.has_remaining() {
        return Err(FormatError::UnexpectedEof);
    }
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(FormatError::InvalidBool(other)),
    }
}

/// Writes a full registry record.
pub(crate) fn encode_registry(buf: &mut impl BufMut, all_synchronized: bool, buckets: &[DimensionBucket]) {
    buf.put_u32(FORMAT_SIGNATURE);
    put_bool(buf, all_synchronized);
    put_varint(buf, buckets.len() as u64);
    for bucket in buckets {
        bucket.serialize(buf);
    }
}

/// Reads a full registry record for a registry holding `max_dimensions` buckets.
pub(crate) fn decode_registry(
    buf: &mut impl Buf,
    max_dimensions: usize,
) -> Result<(bool, Vec<DimensionBucket>), FormatError> {
    if buf.remaining() < 4 {
        return Err(FormatError::UnexpectedEof);
    }
    let signature = buf.get_u32();
    if signature != FORMAT_SIGNATURE {
        return Err(FormatError::BadSignature {
            expected: FORMAT_SIGNATURE,
            got: signature,
        });
    }
    let all_synchronized = get_bool(buf)?;
    let bucket_count = get_varint(buf)?;
    if bucket_count == 0 || bucket_count > MAX_BUCKETS || bucket_count != max_dimensions as u64 {
        return Err(FormatError::BucketCount {
            expected: max_dimensions,
            got: bucket_count,
        });
    }
    let buckets = (1..=max_dimensions)
        .map(|dimensions| DimensionBucket::deserialize(buf, dimensions))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((all_synchronized, buckets))
}

/*!
This module defines the byte layout `GradStats` and `SplitEntry` use when they are sent between workers to be reduced. Every field is written little endian at a fixed offset, so the layout does not depend on the platform or on how the compiler lays out the structs.

| record | bytes | layout |
|--------|-------|--------|
| `GradStats` | 16 | `sum_grad: f64`, `sum_hess: f64` |
| `SplitEntry` | 44 | `loss_chg: f32`, `sindex: u32`, `split_value: f32`, `left_sum: GradStats`, `right_sum: GradStats` |
*/

use crate::{entry::SplitEntry, stats::GradStats};
use itertools::izip;
use std::convert::TryInto;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
	#[error("expected {expected} bytes, got {actual}")]
	WrongLength { expected: usize, actual: usize },
}

/// A record with a fixed size byte encoding that a reduction transport can ship between workers.
pub trait WireRecord: Sized {
	const SIZE: usize;
	/// Write the record into `bytes`, which must be exactly `SIZE` bytes long.
	fn encode(&self, bytes: &mut [u8]);
	fn decode(bytes: &[u8]) -> Result<Self, DecodeError>;
	/// Merge `src` into `dst`.
	fn reduce(dst: &mut Self, src: &Self);
}

impl WireRecord for GradStats {
	const SIZE: usize = 16;

	fn encode(&self, bytes: &mut [u8]) {
		bytes[0..8].copy_from_slice(&self.sum_grad.to_le_bytes());
		bytes[8..16].copy_from_slice(&self.sum_hess.to_le_bytes());
	}

	fn decode(bytes: &[u8]) -> Result<GradStats, DecodeError> {
		check_length::<GradStats>(bytes)?;
		Ok(GradStats::new(
			f64::from_le_bytes(read_array(&bytes[0..8])?),
			f64::from_le_bytes(read_array(&bytes[8..16])?),
		))
	}

	fn reduce(dst: &mut GradStats, src: &GradStats) {
		GradStats::reduce(dst, src);
	}
}

impl WireRecord for SplitEntry {
	const SIZE: usize = 12 + 2 * GradStats::SIZE;

	fn encode(&self, bytes: &mut [u8]) {
		bytes[0..4].copy_from_slice(&self.loss_chg.to_le_bytes());
		bytes[4..8].copy_from_slice(&self.sindex().to_le_bytes());
		bytes[8..12].copy_from_slice(&self.split_value.to_le_bytes());
		self.left_sum.encode(&mut bytes[12..28]);
		self.right_sum.encode(&mut bytes[28..44]);
	}

	fn decode(bytes: &[u8]) -> Result<SplitEntry, DecodeError> {
		check_length::<SplitEntry>(bytes)?;
		Ok(SplitEntry::from_parts(
			f32::from_le_bytes(read_array(&bytes[0..4])?),
			u32::from_le_bytes(read_array(&bytes[4..8])?),
			f32::from_le_bytes(read_array(&bytes[8..12])?),
			GradStats::decode(&bytes[12..28])?,
			GradStats::decode(&bytes[28..44])?,
		))
	}

	fn reduce(dst: &mut SplitEntry, src: &SplitEntry) {
		SplitEntry::reduce(dst, src);
	}
}

/// Encode a slice of records into a contiguous buffer.
pub fn encode_all<T: WireRecord>(records: &[T]) -> Vec<u8> {
	let mut bytes = vec![0; records.len() * T::SIZE];
	for (record, chunk) in izip!(records, bytes.chunks_exact_mut(T::SIZE)) {
		record.encode(chunk);
	}
	bytes
}

/// Decode a buffer produced by `encode_all`.
pub fn decode_all<T: WireRecord>(bytes: &[u8]) -> Result<Vec<T>, DecodeError> {
	if bytes.len() % T::SIZE != 0 {
		return Err(DecodeError::WrongLength {
			expected: (bytes.len() / T::SIZE + 1) * T::SIZE,
			actual: bytes.len(),
		});
	}
	bytes.chunks_exact(T::SIZE).map(T::decode).collect()
}

/**
Reduce the records encoded in `src` into the records encoded in `dst`, element by element, and write the results back to `dst`. This is the callback an all-reduce transport calls with two buffers of the same length.
*/
pub fn reduce_encoded<T: WireRecord>(dst: &mut [u8], src: &[u8]) -> Result<(), DecodeError> {
	if dst.len() != src.len() {
		return Err(DecodeError::WrongLength {
			expected: dst.len(),
			actual: src.len(),
		});
	}
	let mut dst_records = decode_all::<T>(dst)?;
	let src_records = decode_all::<T>(src)?;
	for (dst_record, src_record, chunk) in izip!(
		&mut dst_records,
		&src_records,
		dst.chunks_exact_mut(T::SIZE)
	) {
		T::reduce(dst_record, src_record);
		dst_record.encode(chunk);
	}
	Ok(())
}

fn check_length<T: WireRecord>(bytes: &[u8]) -> Result<(), DecodeError> {
	if bytes.len() != T::SIZE {
		return Err(DecodeError::WrongLength {
			expected: T::SIZE,
			actual: bytes.len(),
		});
	}
	Ok(())
}

fn read_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], DecodeError> {
	bytes.try_into().map_err(|_| DecodeError::WrongLength {
		expected: N,
		actual: bytes.len(),
	})
}

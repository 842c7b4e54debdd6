//! EBML variable-length integers and element identifiers

use crate::error::Result;
use crate::macros::err;

use std::fmt::{Debug, Display, Formatter, UpperHex};
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

/// An EBML variable-size integer
///
/// A `VInt` is an unsigned integer composed of up to 8 octets, with 7 usable bits per octet.
///
/// To ensure safe construction, users must create them through the `TryFrom` implementation
/// or [`VInt::parse`].
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct VInt(pub(crate) u64);

impl VInt {
	// Each octet will shave a single bit off each byte
	const USABLE_BITS_PER_BYTE: u64 = 7;
	const MAX_OCTET_LENGTH: u64 = 8;
	const USABLE_BITS: u64 = Self::MAX_OCTET_LENGTH * Self::USABLE_BITS_PER_BYTE;

	/// The maximum value that can be represented by a `VInt`
	pub const MAX: u64 = u64::MAX >> (u64::BITS as u64 - Self::USABLE_BITS);
	/// A `VInt` with a value of 0
	pub const ZERO: Self = Self(0);
	/// A `VInt` marking a size that is not yet known
	///
	/// Since EBML is built for streaming, elements can declare that their data length
	/// is unknown. On the wire this is a size field with every `VINT_DATA` bit set.
	pub const UNKNOWN: Self = Self(1 << (u64::BITS as u64 - 1));

	/// Gets the inner value of the `VInt`
	///
	/// # Examples
	///
	/// ```rust
	/// use mkv_tree::VInt;
	///
	/// # fn main() -> mkv_tree::error::Result<()> {
	/// let vint = VInt::try_from(2)?;
	/// assert_eq!(vint.value(), 2);
	/// # Ok(()) }
	/// ```
	#[inline]
	pub fn value(self) -> u64 {
		self.0
	}

	/// Whether this `VInt` represents an unknown size
	#[inline]
	pub fn is_unknown(self) -> bool {
		self == Self::UNKNOWN
	}

	/// Parse a `VInt` from a reader
	///
	/// `max_length` can be used to specify the maximum number of octets the number should
	/// occupy, otherwise it should be `8`.
	///
	/// Returns the parsed value and the number of octets it occupied on the wire.
	///
	/// # Errors
	///
	/// * The octet count is zero, greater than 8, or greater than `max_length`
	/// * The reader ran dry
	pub fn parse<R>(reader: &mut R, max_length: u8) -> Result<(Self, u8)>
	where
		R: Read,
	{
		let (val, octets) = parse_vint(reader, max_length, false)?;

		// Special case for unknown sizes (all VINT_DATA bits set to one)
		if val + 1 == 1 << (Self::USABLE_BITS_PER_BYTE * u64::from(octets)) {
			return Ok((Self::UNKNOWN, octets));
		}

		Ok((Self(val), octets))
	}

	/// Represents the length of the `VInt` in octets
	///
	/// NOTE: The value returned will always be <= 8. Meaningless for [`VInt::UNKNOWN`],
	/// whose wire length is decided by the writer.
	#[inline]
	pub fn octet_length(self) -> u8 {
		debug_assert!(!self.is_unknown());
		octet_length(self.0)
	}

	/// Converts the `VInt` into a byte Vec
	///
	/// * `min_length` can be used to specify the minimum number of octets the number should
	///   occupy. This is what keeps a fixed-width size field stable.
	/// * `max_length` can be used to specify the maximum number of octets the number should
	///   occupy.
	///
	/// # Errors
	///
	/// * The octet length is greater than `max_length` (if provided)
	///
	/// # Examples
	///
	/// ```rust
	/// use mkv_tree::VInt;
	///
	/// # fn main() -> mkv_tree::error::Result<()> {
	/// let vint = VInt::try_from(10)?;
	/// let bytes = vint.as_bytes(None, None)?;
	///
	/// assert_eq!(bytes, &[0b1000_1010]);
	/// # Ok(()) }
	/// ```
	pub fn as_bytes(self, min_length: Option<u8>, max_length: Option<u8>) -> Result<Vec<u8>> {
		let mut ret = Vec::with_capacity(Self::MAX_OCTET_LENGTH as usize);
		self.write_to(min_length, max_length, &mut ret)?;
		Ok(ret)
	}

	/// Writes the `VInt`, returning the number of octets emitted
	///
	/// An unknown size is written with `min_length` octets (one if unset): the marker
	/// octet carries its remaining data bits set, followed by all-ones octets.
	pub(crate) fn write_to<W>(
		self,
		min_length: Option<u8>,
		max_length: Option<u8>,
		writer: &mut W,
	) -> Result<u8>
	where
		W: Write,
	{
		let octets = if self.is_unknown() {
			min_length.unwrap_or(1)
		} else {
			std::cmp::max(self.octet_length(), min_length.unwrap_or(0))
		};

		if octets == 0 || octets > max_length.unwrap_or(Self::MAX_OCTET_LENGTH as u8) {
			err!(BadVintSize);
		}

		let data_bits = u64::from(octets) * Self::USABLE_BITS_PER_BYTE;
		let mut value = if self.is_unknown() {
			(1 << data_bits) - 1
		} else {
			self.0
		};

		// Add the octet length marker
		value |= 1 << data_bits;

		let mut byte_shift = (octets - 1) as i8;
		while byte_shift >= 0 {
			writer.write_u8((value >> (byte_shift * 8)) as u8)?;
			byte_shift -= 1;
		}

		Ok(octets)
	}
}

impl TryFrom<u64> for VInt {
	type Error = crate::error::MkvError;

	fn try_from(value: u64) -> Result<Self> {
		if value > Self::MAX {
			err!(BadVintSize);
		}

		Ok(Self(value))
	}
}

impl PartialEq<u64> for VInt {
	fn eq(&self, other: &u64) -> bool {
		self.0 == *other
	}
}

impl Debug for VInt {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let mut debug = f.debug_tuple("VInt");
		if self.is_unknown() {
			debug.field(&"<unknown>");
		} else {
			debug.field(&self.0);
		}
		debug.finish()
	}
}

impl Display for VInt {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

fn parse_vint<R>(reader: &mut R, max_length: u8, retain_marker: bool) -> Result<(u64, u8)>
where
	R: Read,
{
	let start = reader.read_u8()?;
	let octet_length = verify_length(start, max_length)?;

	let mut bytes_read = 1;

	let mut val = u64::from(start);
	if !retain_marker {
		val ^= 1 << start.ilog2();
	}

	while u32::from(bytes_read) < octet_length {
		bytes_read += 1;
		val = (val << 8) | u64::from(reader.read_u8()?);
	}

	Ok((val, bytes_read))
}

// Verify that the octet length is nonzero and <= 8
fn verify_length(first_byte: u8, max_length: u8) -> Result<u32> {
	// A value of 0b0000_0000 indicates either an invalid VInt, or one with an octet length > 8
	if first_byte == 0b0000_0000 {
		err!(BadVintSize);
	}

	let octet_length = (VInt::MAX_OCTET_LENGTH as u32) - first_byte.ilog2();
	if octet_length > 8 || octet_length as u8 > max_length {
		err!(BadVintSize);
	}

	Ok(octet_length)
}

fn octet_length(mut value: u64) -> u8 {
	let mut octets = 0;
	loop {
		octets += 1;

		value >>= VInt::USABLE_BITS_PER_BYTE;
		if value == 0 {
			break;
		}
	}

	octets
}

/// Minimal number of octets needed to store `value` as a big-endian unsigned
/// integer element payload (always at least one)
pub(crate) fn uint_octet_length(value: u64) -> u8 {
	std::cmp::max(1, ((u64::BITS - value.leading_zeros()).div_ceil(8)) as u8)
}

/// The maximum octet length of an element identifier
///
/// <https://www.rfc-editor.org/rfc/rfc8794.html#name-ebmlmaxidlength-element>
pub(crate) const MAX_ID_LENGTH: u8 = 4;

/// An EBML element ID
///
/// An `ElementId` is a [`VInt`] with the following conditions:
///
/// * The `VINT_MARKER` is retained after parsing, making the canonical value
/// * Equality compares canonical values, independent of any padding used during encoding
/// * When encoding, the minimal significant length (1 to 4 octets) is used
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct ElementId(pub(crate) u64);

impl ElementId {
	/// Parse an `ElementId` from a reader
	///
	/// An element ID is parsed similarly to a normal [`VInt`], but the `VINT_MARKER` is retained.
	///
	/// Returns the parsed identifier and the number of octets it occupied on the wire.
	///
	/// # Errors
	///
	/// * The ID cannot fit within `max_id_length`
	pub fn parse<R>(reader: &mut R, max_id_length: u8) -> Result<(Self, u8)>
	where
		R: Read,
	{
		let (val, bytes_read) = parse_vint(reader, max_id_length, true)?;
		Ok((Self(val), bytes_read))
	}

	/// Builds an `ElementId` from its raw encoded bytes
	///
	/// This is the decoding half of a stored seek-entry target identifier.
	///
	/// # Errors
	///
	/// * `bytes` is empty, longer than 4 octets, or carries no significant bits
	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		if bytes.is_empty() || bytes.len() > MAX_ID_LENGTH as usize {
			err!(BadIdLength(bytes.len()));
		}

		let val = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
		if val == 0 {
			err!(BadIdLength(bytes.len()));
		}

		Ok(Self(val))
	}

	/// Get the inner value of the `ElementId`
	pub fn value(self) -> u64 {
		self.0
	}

	/// The significant length of the identifier in octets (1 to 4)
	///
	/// Derived from the position of the retained `VINT_MARKER`.
	pub fn octet_length(self) -> u8 {
		(self.0.ilog2() / 8 + 1) as u8
	}

	/// Converts the `ElementId` into its minimal significant-length byte form
	///
	/// # Examples
	///
	/// ```rust
	/// use mkv_tree::ElementId;
	///
	/// # fn main() -> mkv_tree::error::Result<()> {
	/// const SEGMENT_ID: [u8; 4] = [0x18, 0x53, 0x80, 0x67];
	///
	/// let (id, _bytes_read) = ElementId::parse(&mut &SEGMENT_ID[..], 4)?;
	/// assert_eq!(id.as_bytes(), &SEGMENT_ID);
	/// # Ok(()) }
	/// ```
	pub fn as_bytes(self) -> Vec<u8> {
		let length = self.octet_length();

		let mut bytes = Vec::with_capacity(length as usize);
		for shift in (0..length).rev() {
			bytes.push((self.0 >> (u32::from(shift) * 8)) as u8);
		}

		bytes
	}

	/// Writes the canonical bytes, returning the number of octets emitted
	pub(crate) fn write_to<W>(self, writer: &mut W) -> Result<u8>
	where
		W: Write,
	{
		writer.write_all(&self.as_bytes())?;
		Ok(self.octet_length())
	}
}

impl PartialEq<u64> for ElementId {
	fn eq(&self, other: &u64) -> bool {
		self.0 == *other
	}
}

impl UpperHex for ElementId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		std::fmt::UpperHex::fmt(&self.0, f)
	}
}

impl Debug for ElementId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "ElementId({:#X})", self.0)
	}
}

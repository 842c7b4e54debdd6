//! Parsing element trees from a byte stream
//!
//! The reader tracks the absolute stream position and records it on every element it
//! materializes, so a parsed segment supports the same position arithmetic as one
//! being written. Unknown elements (Void, CRC-32, and anything else this crate does
//! not model) are skipped; known elements in an illegal position are structural
//! errors.

use crate::context::{ElementDataKind, ElementType};
use crate::element::Element;
use crate::error::{ErrorKind, MkvError, Result};
use crate::macros::decode_err;
use crate::segment::Segment;
use crate::vint::{ElementId, MAX_ID_LENGTH, VInt};

use std::io::{self, Read};

/// The maximum octet length of a size field
///
/// <https://www.rfc-editor.org/rfc/rfc8794.html#name-ebmlmaxsizelength-element>
const MAX_SIZE_LENGTH: u8 = 8;

const MAX_DEPTH: u8 = 16;

/// A position-tracking element parser
pub struct ElementReader<R> {
	reader: R,
	position: u64,
}

impl<R> ElementReader<R>
where
	R: Read,
{
	/// Creates a reader positioned at the start of `reader`
	pub fn new(reader: R) -> Self {
		Self::with_position(reader, 0)
	}

	/// Creates a reader resuming at a known absolute position in `reader`
	pub fn with_position(reader: R, position: u64) -> Self {
		Self { reader, position }
	}

	/// The absolute position of the next byte this reader will consume
	pub fn position(&self) -> u64 {
		self.position
	}

	/// Consumes the reader, returning the source
	pub fn into_inner(self) -> R {
		self.reader
	}

	/// Reads the next segment from the stream
	///
	/// Unknown elements before the segment (an EBML header, Void, CRC-32) are
	/// skipped. A segment with a known size is read to its declared end; an
	/// unknown-size segment is read until the stream runs dry, which is the
	/// streaming-write layout. Call again to read a following segment.
	///
	/// # Errors
	///
	/// * The stream ends before a segment appears
	/// * A known element type appears somewhere its context forbids
	/// * Malformed headers or leaf payloads
	pub fn read_segment(&mut self) -> Result<Segment> {
		loop {
			let start = self.position;
			let (id, size) = match self.read_header() {
				Err(err) if is_unexpected_eof(&err) => {
					decode_err!(@BAIL "stream does not contain a segment element")
				},
				result => result?,
			};

			match ElementType::from_id(id) {
				Some(ElementType::Segment) => {
					let size_length =
						(self.position - start - u64::from(ElementType::Segment.id().octet_length()))
							as u8;

					let mut segment = Segment::with_size_length(size_length)?;
					segment.set_position(start);

					let limit = if size.is_unknown() {
						None
					} else {
						segment.finalize(size.value())?;
						Some(size.value())
					};

					self.read_children(segment.element_mut(), limit, 1)?;
					segment.adopt_clusters();

					return Ok(segment);
				},
				Some(_) => decode_err!(@BAIL "expected a segment element at the top level"),
				None => {
					if size.is_unknown() {
						decode_err!(@BAIL "unknown-size element outside of a segment");
					}

					log::debug!("Skipping unknown top-level element: {:X}", id);
					self.skip(size.value())?;
				},
			}
		}
	}

	fn read_header(&mut self) -> Result<(ElementId, VInt)> {
		let (id, id_length) = ElementId::parse(&mut self.reader, MAX_ID_LENGTH)?;
		let (size, size_length) = VInt::parse(&mut self.reader, MAX_SIZE_LENGTH)?;
		self.position += u64::from(id_length) + u64::from(size_length);
		Ok((id, size))
	}

	fn read_children(&mut self, parent: &mut Element, limit: Option<u64>, depth: u8) -> Result<()> {
		if depth > MAX_DEPTH {
			decode_err!(@BAIL "maximum element depth reached");
		}

		let end = limit.map(|limit| self.position + limit);

		loop {
			if let Some(end) = end {
				if self.position > end {
					decode_err!(@BAIL "children overran their parent's declared size");
				}
				if self.position == end {
					break;
				}
			}

			let start = self.position;
			let (id, size) = match self.read_header() {
				// A streamed parent has no declared end; it ends with the stream
				Err(err) if end.is_none() && is_unexpected_eof(&err) => break,
				result => result?,
			};

			let Some(ty) = ElementType::from_id(id) else {
				if size.is_unknown() {
					decode_err!(@BAIL "unknown-size element cannot be skipped");
				}

				log::debug!("Encountered unknown element: {:X}, skipping", id);
				self.skip(size.value())?;
				continue;
			};

			parent.validate_child(ty)?;

			let mut child = match ty.kind() {
				ElementDataKind::Master => {
					if size.is_unknown() {
						decode_err!(@BAIL "unknown-size master inside a segment");
					}

					let mut master = Element::master(ty);
					self.read_children(&mut master, Some(size.value()), depth + 1)?;
					master
				},
				ElementDataKind::UnsignedInt => Element::uint(ty, self.read_uint(size)?),
				ElementDataKind::Binary => Element::binary(ty, self.read_binary(size)?),
			};

			child.set_position(start);
			child.set_size(size);
			parent.push(child)?;
		}

		Ok(())
	}

	fn read_uint(&mut self, size: VInt) -> Result<u64> {
		// An Unsigned Integer Element MUST declare a length from zero to eight octets
		if size.is_unknown() || size.value() > 8 {
			decode_err!(@BAIL "invalid size for an unsigned integer element");
		}

		let length = size.value() as usize;
		let mut buf = [0u8; 8];
		self.reader.read_exact(&mut buf[8 - length..])?;
		self.position += length as u64;

		Ok(u64::from_be_bytes(buf))
	}

	fn read_binary(&mut self, size: VInt) -> Result<Vec<u8>> {
		if size.is_unknown() {
			decode_err!(@BAIL "invalid size for a binary element");
		}

		let length = size.value();
		let mut content = Vec::new();
		let read = self.reader.by_ref().take(length).read_to_end(&mut content)?;
		if read as u64 != length {
			decode_err!(@BAIL "binary element data was cut short");
		}

		self.position += length;
		Ok(content)
	}

	fn skip(&mut self, length: u64) -> Result<()> {
		let copied = io::copy(&mut self.reader.by_ref().take(length), &mut io::sink())?;
		if copied != length {
			decode_err!(@BAIL "element data was cut short");
		}

		self.position += length;
		Ok(())
	}
}

fn is_unexpected_eof(error: &MkvError) -> bool {
	matches!(error.kind(), ErrorKind::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof)
}

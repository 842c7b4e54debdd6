//! Rendering element trees to a byte stream
//!
//! The writer tracks the absolute stream position and records it on every element it
//! lays out, which is what makes seek indexing possible during a streamed write: begin
//! the segment (its size field goes out as the unknown marker), append children as
//! they are produced, and index each one the moment it lands.

use crate::element::{ChildId, Element, ElementData};
use crate::error::Result;
use crate::segment::Segment;
use crate::vint::{VInt, uint_octet_length};

use std::io::Write;

use byteorder::WriteBytesExt;

/// A position-tracking element serializer
pub struct ElementWriter<W> {
	dest: W,
	position: u64,
}

impl<W> ElementWriter<W>
where
	W: Write,
{
	/// Creates a writer positioned at the start of `dest`
	pub fn new(dest: W) -> Self {
		Self::with_position(dest, 0)
	}

	/// Creates a writer resuming at a known absolute position in `dest`
	pub fn with_position(dest: W, position: u64) -> Self {
		Self { dest, position }
	}

	/// The absolute position of the next byte this writer will emit
	pub fn position(&self) -> u64 {
		self.position
	}

	/// Consumes the writer, returning the destination
	pub fn into_inner(self) -> W {
		self.dest
	}

	/// Renders `element` and its descendants at the current position
	///
	/// Payload sizes are computed bottom-up and written in minimal form; every node's
	/// absolute position and size are recorded as it is laid out.
	///
	/// # Errors
	///
	/// * A payload size exceeds [`VInt::MAX`]
	/// * Writing to the destination fails
	pub fn write_element(&mut self, element: &mut Element) -> Result<()> {
		let size = VInt::try_from(data_size(element)?)?;

		element.set_position(self.position);
		element.set_size(size);

		log::trace!(
			"Writing {} ({} payload bytes) at {}",
			element.ty().name(),
			size,
			self.position
		);

		self.position += u64::from(element.ty().id().write_to(&mut self.dest)?);
		self.position += u64::from(size.write_to(None, None, &mut self.dest)?);

		if element.is_master() {
			for (_, child) in element.child_nodes_mut() {
				self.write_element(child)?;
			}

			return Ok(());
		}

		match element.data() {
			ElementData::UnsignedInt(value) => {
				let value = *value;
				let octets = uint_octet_length(value);
				for shift in (0..octets).rev() {
					self.dest.write_u8((value >> (u32::from(shift) * 8)) as u8)?;
				}
				self.position += u64::from(octets);
			},
			ElementData::Binary(data) => {
				self.dest.write_all(data)?;
				self.position += data.len() as u64;
			},
			// Masters returned above
			ElementData::Master(_) => unreachable!(),
		}

		Ok(())
	}

	/// Writes the segment header at the current position
	///
	/// The 4-byte identifier is followed by the fixed-width size field: the unknown
	/// marker while the segment is open, or the finalized size padded to the fixed
	/// width. Either way the header length is `segment.header_size()`, so relative
	/// positions computed before finalization stay valid.
	///
	/// # Errors
	///
	/// * Writing to the destination fails
	pub fn begin_segment(&mut self, segment: &mut Segment) -> Result<()> {
		segment.set_position(self.position);

		log::trace!("Beginning segment at {}", self.position);

		self.position += u64::from(segment.as_element().ty().id().write_to(&mut self.dest)?);
		self.position += u64::from(segment.size().write_to(
			Some(segment.size_length()),
			Some(segment.size_length()),
			&mut self.dest,
		)?);

		Ok(())
	}

	/// Renders `child` at the current position and hands ownership to `segment`
	///
	/// This is the streaming write flow: the child is context-validated, laid out,
	/// and appended to the segment's tree; the returned handle can be used to index
	/// the child in a seek head right away.
	///
	/// # Errors
	///
	/// * The segment's context rules reject `child` (nothing is written in that case)
	/// * Writing to the destination fails
	pub fn append_child(&mut self, segment: &mut Segment, mut child: Element) -> Result<ChildId> {
		segment.validate_child(child.ty())?;
		self.write_element(&mut child)?;
		segment.push(child)
	}

	/// Renders a fully built segment: header plus all current children
	///
	/// Missing mandatory children are logged, not errors — a streamed segment may
	/// legitimately be incomplete at this point.
	///
	/// # Errors
	///
	/// See [`ElementWriter::write_element`].
	pub fn write_segment(&mut self, segment: &mut Segment) -> Result<()> {
		for ty in segment.missing_children() {
			log::warn!("Segment is missing a mandatory {} child", ty.name());
		}

		self.begin_segment(segment)?;
		for (_, child) in segment.element_mut().child_nodes_mut() {
			self.write_element(child)?;
		}

		Ok(())
	}
}

// Payload size of `element`, computing master payloads bottom-up
fn data_size(element: &Element) -> Result<u64> {
	match element.data() {
		ElementData::Master(_) => {
			let mut total = 0u64;
			for (_, child) in element.children() {
				total += total_size(child)?;
			}
			Ok(total)
		},
		ElementData::UnsignedInt(value) => Ok(u64::from(uint_octet_length(*value))),
		ElementData::Binary(data) => Ok(data.len() as u64),
	}
}

// Full encoded size of `element`: identifier + minimal size field + payload
fn total_size(element: &Element) -> Result<u64> {
	let data = data_size(element)?;
	let id_length = element.ty().id().octet_length();
	let size_length = VInt::try_from(data)?.octet_length();

	Ok(u64::from(id_length) + u64::from(size_length) + data)
}

#[cfg(test)]
mod tests {
	use super::ElementWriter;
	use crate::context::ElementType;
	use crate::element::Element;
	use crate::segment::Segment;

	#[test_log::test]
	fn open_segment_header() {
		let mut writer = ElementWriter::new(Vec::new());
		let mut segment = Segment::new();
		writer.begin_segment(&mut segment).unwrap();

		// 4-byte identifier + 5-octet unknown size marker
		assert_eq!(
			writer.into_inner(),
			vec![0x18, 0x53, 0x80, 0x67, 0x0F, 0xFF, 0xFF, 0xFF, 0xFF]
		);
		assert_eq!(segment.position(), Some(0));
	}

	#[test_log::test]
	fn finalized_segment_header_keeps_its_width() {
		let mut writer = ElementWriter::new(Vec::new());
		let mut segment = Segment::new();
		segment.finalize(300).unwrap();
		writer.begin_segment(&mut segment).unwrap();

		// 300 padded to the fixed 5-octet width
		assert_eq!(
			writer.into_inner(),
			vec![0x18, 0x53, 0x80, 0x67, 0x08, 0x00, 0x00, 0x01, 0x2C]
		);
	}

	#[test_log::test]
	fn seek_entry_wire_format() {
		let mut entry = Element::master(ElementType::Seek);
		entry
			.push(Element::binary(
				ElementType::SeekId,
				ElementType::Tracks.id().as_bytes(),
			))
			.unwrap();
		entry
			.push(Element::uint(ElementType::SeekPosition, 38))
			.unwrap();

		let mut writer = ElementWriter::new(Vec::new());
		writer.write_element(&mut entry).unwrap();

		assert_eq!(
			writer.into_inner(),
			vec![
				0x4D, 0xBB, 0x8B, // Seek, 11 payload bytes
				0x53, 0xAB, 0x84, 0x16, 0x54, 0xAE, 0x6B, // SeekID, 4 payload bytes
				0x53, 0xAC, 0x81, 0x26, // SeekPosition, 1 payload byte
			]
		);
	}

	#[test_log::test]
	fn unsigned_integers_use_minimal_octets() {
		for (value, payload) in [
			(0u64, vec![0x00]),
			(0xFF, vec![0xFF]),
			(0x100, vec![0x01, 0x00]),
		] {
			let mut element = Element::uint(ElementType::SeekPosition, value);
			let mut writer = ElementWriter::new(Vec::new());
			writer.write_element(&mut element).unwrap();

			let mut expected = vec![0x53, 0xAC, 0x80 | payload.len() as u8];
			expected.extend_from_slice(&payload);
			assert_eq!(writer.into_inner(), expected);
		}
	}

	#[test_log::test]
	fn positions_are_recorded_during_the_write() {
		let mut writer = ElementWriter::new(Vec::new());
		let mut segment = Segment::new();
		writer.begin_segment(&mut segment).unwrap();

		let info = writer
			.append_child(&mut segment, Element::master(ElementType::Info))
			.unwrap();
		let cluster = writer
			.append_child(&mut segment, Element::master(ElementType::Cluster))
			.unwrap();

		// Header is 9 bytes; an empty Info occupies 4 (id) + 1 (size) bytes
		assert_eq!(segment.child(info).unwrap().position(), Some(9));
		assert_eq!(segment.child(cluster).unwrap().position(), Some(14));
		assert_eq!(writer.position(), 19);

		assert_eq!(segment.relative_position_of(segment.child(cluster).unwrap()), Some(5));
	}

	#[test_log::test]
	fn invalid_children_write_nothing() {
		let mut writer = ElementWriter::new(Vec::new());
		let mut segment = Segment::new();
		writer.begin_segment(&mut segment).unwrap();

		let before = writer.position();
		assert!(
			writer
				.append_child(&mut segment, Element::master(ElementType::Seek))
				.is_err()
		);
		assert_eq!(writer.position(), before);
		assert_eq!(writer.into_inner().len() as u64, before);
	}
}

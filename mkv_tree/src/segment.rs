//! The top-level container and its position arithmetic
//!
//! A [`Segment`] is the addressing origin for everything it contains: seek entries and
//! cue points store byte offsets relative to the segment's first content byte. To keep
//! those offsets valid while the total size is still unknown (the stream is still being
//! written), the width of the segment's size field is fixed at construction and never
//! changes, even once the true size is known.

use crate::context::ElementType;
use crate::element::{ChildId, Element};
use crate::error::Result;
use crate::macros::err;
use crate::vint::VInt;

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of a live [`Segment`]
///
/// Cluster elements hold one of these as a weak back-reference to their owning
/// segment. It is a lookup key, not an ownership edge; duplicating a segment tree
/// repoints the copies at the new segment's token.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SegmentToken(u64);

impl SegmentToken {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(0);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

// The segment identifier always occupies 4 octets on the wire
const SEGMENT_ID_LENGTH: u64 = 4;

/// The default width of a segment's size field, in octets
///
/// Five octets represent totals up to 2^35 - 2 bytes (roughly 32 GiB), enough for any
/// practical container while keeping the header compact.
pub const DEFAULT_SIZE_LENGTH: u8 = 5;

/// A top-level container instance
///
/// Owns a [`Segment`](ElementType::Segment)-typed master element and the fixed width
/// of its size field. Child management is delegated to the element, with one addition:
/// cluster children are stamped with this segment's [`SegmentToken`].
#[derive(Debug, PartialEq)]
pub struct Segment {
	token: SegmentToken,
	element: Element,
	size_length: u8,
}

impl Segment {
	/// Creates a segment open for streamed writing
	///
	/// The total size starts out unknown and the size field takes its default width
	/// ([`DEFAULT_SIZE_LENGTH`]).
	pub fn new() -> Self {
		Self {
			token: SegmentToken::next(),
			element: Element::master(ElementType::Segment),
			size_length: DEFAULT_SIZE_LENGTH,
		}
	}

	/// Creates a segment with a caller-chosen size-field width
	///
	/// The width is fixed for the lifetime of the segment: every relative position
	/// computed against this segment stays valid once the true size is known.
	///
	/// # Errors
	///
	/// * `size_length` is outside of `1..=8`
	pub fn with_size_length(size_length: u8) -> Result<Self> {
		if size_length == 0 || size_length > 8 {
			err!(BadVintSize);
		}

		Ok(Self {
			token: SegmentToken::next(),
			element: Element::master(ElementType::Segment),
			size_length,
		})
	}

	/// This segment's identity token
	pub fn token(&self) -> SegmentToken {
		self.token
	}

	/// The absolute byte position of the segment's first identifier byte
	pub fn position(&self) -> Option<u64> {
		self.element.position()
	}

	/// Records the absolute byte position of the segment
	pub fn set_position(&mut self, position: u64) {
		self.element.set_position(position);
	}

	/// The segment's payload size ([`VInt::UNKNOWN`] while still open)
	pub fn size(&self) -> VInt {
		self.element.size()
	}

	/// The fixed width of the size field, in octets
	pub fn size_length(&self) -> u8 {
		self.size_length
	}

	/// The byte length of the segment header (identifier plus size field)
	///
	/// Fixed at construction; finalizing the size never changes it.
	pub fn header_size(&self) -> u64 {
		SEGMENT_ID_LENGTH + u64::from(self.size_length)
	}

	/// Whether the segment is still open for streamed writing
	pub fn is_open(&self) -> bool {
		self.element.size().is_unknown()
	}

	/// Fixes the segment's true payload size
	///
	/// The header keeps its construction-time width, so previously computed relative
	/// positions stay valid.
	///
	/// # Errors
	///
	/// * [`TooMuchData`](crate::error::ErrorKind::TooMuchData) when `total` cannot be
	///   represented in the fixed-width size field
	pub fn finalize(&mut self, total: u64) -> Result<()> {
		// The all-ones pattern is reserved for the unknown marker
		let capacity = (1u64 << (7 * u32::from(self.size_length))) - 2;
		if total > capacity {
			err!(TooMuchData);
		}

		self.element.set_size(VInt(total));
		Ok(())
	}

	fn origin(&self) -> Option<u64> {
		self.position().map(|position| position + self.header_size())
	}

	/// Converts an absolute stream offset into an offset relative to the segment's
	/// first content byte
	///
	/// `None` when the segment has not been placed in a stream, or when
	/// `global_position` addresses a byte before the segment's content.
	pub fn relative_position(&self, global_position: u64) -> Option<u64> {
		global_position.checked_sub(self.origin()?)
	}

	/// Converts a segment-relative offset back into an absolute stream offset
	///
	/// The exact inverse of [`Segment::relative_position`] for every valid operand.
	/// `None` when the segment has not been placed in a stream.
	pub fn global_position(&self, relative_position: u64) -> Option<u64> {
		self.origin()?.checked_add(relative_position)
	}

	/// The segment-relative position of `element`, from its recorded stream position
	///
	/// `None` when either the segment or `element` has no usable position.
	pub fn relative_position_of(&self, element: &Element) -> Option<u64> {
		self.relative_position(element.position()?)
	}

	/// Appends a top-level child, enforcing the segment's context rules
	///
	/// Cluster children are stamped with this segment's token so they can find their
	/// container later.
	///
	/// # Errors
	///
	/// See [`Element::validate_child`].
	pub fn push(&mut self, mut child: Element) -> Result<ChildId> {
		if child.ty() == ElementType::Cluster {
			child.set_owning_segment(Some(self.token));
		}

		self.element.push(child)
	}

	/// Checks that `ty` could be appended to this segment right now
	///
	/// # Errors
	///
	/// See [`Element::validate_child`].
	pub fn validate_child(&self, ty: ElementType) -> Result<()> {
		self.element.validate_child(ty)
	}

	/// Finds the first top-level child of `ty`
	pub fn find_first(&self, ty: ElementType) -> Option<ChildId> {
		self.element.find_first(ty)
	}

	/// Finds the first top-level child of `ty` strictly after `after`
	pub fn find_next(&self, ty: ElementType, after: ChildId) -> Option<ChildId> {
		self.element.find_next(ty, after)
	}

	/// Borrows the child identified by `id`
	pub fn child(&self, id: ChildId) -> Option<&Element> {
		self.element.child(id)
	}

	/// Mutably borrows the child identified by `id`
	pub fn child_mut(&mut self, id: ChildId) -> Option<&mut Element> {
		self.element.child_mut(id)
	}

	/// Iterates the top-level children in stream order
	pub fn children(&self) -> impl Iterator<Item = (ChildId, &Element)> {
		self.element.children()
	}

	/// The number of top-level children
	pub fn child_count(&self) -> usize {
		self.element.child_count()
	}

	/// Mandatory top-level child types with no occurrence yet
	pub fn missing_children(&self) -> Vec<ElementType> {
		self.element.missing_children()
	}

	/// Borrows the underlying master element
	pub fn as_element(&self) -> &Element {
		&self.element
	}

	pub(crate) fn element_mut(&mut self) -> &mut Element {
		&mut self.element
	}

	// Repoint every cluster child's weak back-reference at this segment
	pub(crate) fn adopt_clusters(&mut self) {
		let token = self.token;
		for (_, child) in self.element.child_nodes_mut() {
			if child.ty() == ElementType::Cluster {
				child.set_owning_segment(Some(token));
			}
		}
	}
}

impl Clone for Segment {
	/// Structural copy: the clone owns copies of all children, gets a fresh token,
	/// and every copied cluster is repointed at it
	fn clone(&self) -> Self {
		let mut cloned = Self {
			token: SegmentToken::next(),
			element: self.element.clone(),
			size_length: self.size_length,
		};
		cloned.adopt_clusters();
		cloned
	}
}

impl Default for Segment {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::Segment;
	use crate::context::ElementType;
	use crate::element::Element;
	use crate::error::ErrorKind;

	#[test_log::test]
	fn position_round_trip() {
		let mut segment = Segment::new();
		segment.set_position(4096);

		for relative in [0u64, 1, 37, 4096, u32::MAX as u64] {
			let global = segment.global_position(relative).unwrap();
			assert_eq!(segment.relative_position(global), Some(relative));
		}

		let origin = segment.position().unwrap() + segment.header_size();
		for global in [origin, origin + 1, origin + 9999] {
			let relative = segment.relative_position(global).unwrap();
			assert_eq!(segment.global_position(relative), Some(global));
		}
	}

	#[test_log::test]
	fn unplaced_segments_have_no_positions() {
		let segment = Segment::new();
		assert_eq!(segment.relative_position(100), None);
		assert_eq!(segment.global_position(100), None);

		let mut element = Element::master(ElementType::Cluster);
		element.set_position(100);
		assert_eq!(segment.relative_position_of(&element), None);
	}

	#[test_log::test]
	fn offsets_before_the_content_are_rejected() {
		let mut segment = Segment::new();
		segment.set_position(100);

		// Content starts at 109 (4-byte identifier + 5-byte size field)
		assert_eq!(segment.relative_position(108), None);
		assert_eq!(segment.relative_position(109), Some(0));
	}

	#[test_log::test]
	fn header_size_survives_finalization() {
		let mut segment = Segment::new();
		segment.set_position(512);
		assert!(segment.is_open());

		let header_size = segment.header_size();
		let global = segment.global_position(77).unwrap();

		segment.finalize(1_000_000).unwrap();

		assert!(!segment.is_open());
		assert_eq!(segment.header_size(), header_size);
		assert_eq!(segment.relative_position(global), Some(77));
		assert_eq!(segment.size().value(), 1_000_000);
	}

	#[test_log::test]
	fn finalize_respects_the_fixed_width() {
		let mut segment = Segment::with_size_length(1).unwrap();

		// A single octet holds up to 2^7 - 2; the all-ones pattern means "unknown"
		segment.finalize(126).unwrap();

		let mut segment = Segment::with_size_length(1).unwrap();
		let err = segment.finalize(127).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::TooMuchData));
	}

	#[test_log::test]
	fn concrete_scenario() {
		// Segment at 100 with a header of 12 bytes (4-byte identifier + 8-byte size field)
		let mut segment = Segment::with_size_length(8).unwrap();
		segment.set_position(100);
		assert_eq!(segment.header_size(), 12);

		let mut element = Element::master(ElementType::Cluster);
		element.set_position(150);

		assert_eq!(segment.relative_position_of(&element), Some(38));
		assert_eq!(segment.global_position(38), Some(150));

		// Indexing the element snapshots the relative position and the 4-byte identifier
		let mut head = Element::master(ElementType::SeekHead);
		let entry = head.index_this(&element, &segment).unwrap();

		assert_eq!(head.find_first_of(ElementType::Cluster), Some(entry));

		let entry = head.child(entry).unwrap();
		assert_eq!(entry.target_position(), Some(38));

		let id_leaf = entry.find_first(ElementType::SeekId).unwrap();
		assert_eq!(entry.child(id_leaf).unwrap().as_binary().map(<[u8]>::len), Some(4));
	}

	#[test_log::test]
	fn cluster_children_are_stamped() {
		let mut segment = Segment::new();
		let cluster = segment.push(Element::master(ElementType::Cluster)).unwrap();
		let info = segment.push(Element::master(ElementType::Info)).unwrap();

		assert_eq!(
			segment.child(cluster).unwrap().owning_segment(),
			Some(segment.token())
		);
		assert_eq!(segment.child(info).unwrap().owning_segment(), None);
	}

	#[test_log::test]
	fn cloning_repoints_clusters() {
		let mut segment = Segment::new();
		let cluster = segment.push(Element::master(ElementType::Cluster)).unwrap();

		let cloned = segment.clone();
		assert_ne!(segment.token(), cloned.token());

		// Handles survive the structural copy, but the weak back-reference moves
		assert_eq!(
			segment.child(cluster).unwrap().owning_segment(),
			Some(segment.token())
		);
		assert_eq!(
			cloned.child(cluster).unwrap().owning_segment(),
			Some(cloned.token())
		);
	}

	#[test_log::test]
	fn context_rules_apply_to_top_level_children() {
		let mut segment = Segment::new();
		segment.push(Element::master(ElementType::Info)).unwrap();

		let err = segment
			.push(Element::master(ElementType::Info))
			.unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::DuplicateChild { .. }));

		let err = segment
			.push(Element::master(ElementType::Seek))
			.unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::InvalidChild { .. }));

		assert_eq!(segment.missing_children(), vec![]);
	}
}

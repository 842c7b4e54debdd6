//! The seek-head index
//!
//! A seek head is a [`SeekHead`](ElementType::SeekHead) master whose entries each
//! record a target's element identifier and its byte offset relative to the owning
//! segment's first content byte. Writers append entries as sections land in the
//! stream; readers decode the entries to jump straight to a wanted section.
//!
//! The index is append-only: entries are never removed or mutated, and indexing the
//! same element twice yields two entries. Lookups resolve absent or undecodable
//! fields to sentinels (`None`, `0`, `false`) — "information unavailable", not a
//! confirmed negative.

use crate::context::ElementType;
use crate::element::{ChildId, Element};
use crate::error::{ErrorKind, MkvError, Result};
use crate::segment::Segment;
use crate::vint::ElementId;

impl Element {
	/// Appends a new seek entry indexing `target`
	///
	/// Call on a [`SeekHead`](ElementType::SeekHead) master. The new entry snapshots
	/// `target`'s position relative to `segment` and its type identifier in minimal
	/// significant-length form; the entry and its two leaves are owned by this seek
	/// head from here on.
	///
	/// No check is made for an existing entry indexing the same element — calling
	/// this twice for the same target produces two entries.
	///
	/// # Errors
	///
	/// * [`ErrorKind::NotPlaced`] when `segment` or `target` has no usable stream
	///   position yet
	/// * [`ErrorKind::InvalidChild`] when this element cannot own seek entries
	pub fn index_this(&mut self, target: &Element, segment: &Segment) -> Result<ChildId> {
		let Some(relative_position) = segment.relative_position_of(target) else {
			return Err(MkvError::new(ErrorKind::NotPlaced(target.ty().name())));
		};

		let mut entry = Element::master(ElementType::Seek);
		entry.push(Element::binary(
			ElementType::SeekId,
			target.ty().id().as_bytes(),
		))?;
		entry.push(Element::uint(ElementType::SeekPosition, relative_position))?;

		self.push(entry)
	}

	/// Finds the first seek entry whose target identifier matches `ty`
	///
	/// Entries are scanned in index order. Only each entry's first
	/// [`SeekId`](ElementType::SeekId) leaf is consulted; entries with a missing or
	/// undecodable identifier are skipped, not errors.
	pub fn find_first_of(&self, ty: ElementType) -> Option<ChildId> {
		let wanted = ty.id();

		let mut entry = self.find_first(ElementType::Seek);
		while let Some(id) = entry {
			if self.child(id)?.decoded_target_id() == Some(wanted) {
				return Some(id);
			}

			entry = self.find_next(ElementType::Seek, id);
		}

		None
	}

	/// Finds the next seek entry targeting the same type as `previous`
	///
	/// `previous` is located by identity, not by value: `None` when it does not
	/// belong to this seek head. Also `None` when `previous` itself has no decodable
	/// target identifier, or when no later entry matches. Chain from
	/// [`Element::find_first_of`] to enumerate every entry for one type.
	pub fn find_next_of(&self, previous: ChildId) -> Option<ChildId> {
		let wanted = self.child(previous)?.decoded_target_id()?;

		let mut entry = self.find_next(ElementType::Seek, previous);
		while let Some(id) = entry {
			if self.child(id)?.decoded_target_id() == Some(wanted) {
				return Some(id);
			}

			entry = self.find_next(ElementType::Seek, id);
		}

		None
	}

	/// The entry's stored target position, or `0` when the field is absent
	///
	/// This conflates "position 0" with "field missing"; use
	/// [`Element::target_position`] when the distinction matters.
	pub fn location(&self) -> u64 {
		self.target_position().unwrap_or(0)
	}

	/// The entry's stored target position, if the field is present
	pub fn target_position(&self) -> Option<u64> {
		let id = self.find_first(ElementType::SeekPosition)?;
		self.child(id)?.as_uint()
	}

	/// Decodes the entry's stored target identifier
	///
	/// `Ok(None)` when the field is absent.
	///
	/// # Errors
	///
	/// * [`ErrorKind::IndexCorrupt`] when the stored bytes are not a valid 1–4 octet
	///   identifier — such entries are never matched by the lookup operations
	pub fn target_id(&self) -> Result<Option<ElementId>> {
		let Some(id) = self.find_first(ElementType::SeekId) else {
			return Ok(None);
		};

		let Some(bytes) = self.child(id).and_then(Element::as_binary) else {
			return Ok(None);
		};

		match ElementId::from_bytes(bytes) {
			Ok(decoded) => Ok(Some(decoded)),
			Err(_) => Err(MkvError::new(ErrorKind::IndexCorrupt)),
		}
	}

	// Lenient decode for matching: absent and corrupt identifiers are both `None`
	fn decoded_target_id(&self) -> Option<ElementId> {
		self.target_id().ok().flatten()
	}

	/// Whether the entry's decoded target identifier equals `id`
	///
	/// `false` when the identifier field is absent or undecodable.
	pub fn matches_identifier(&self, id: ElementId) -> bool {
		self.decoded_target_id() == Some(id)
	}

	/// Whether two entries target the same element type
	///
	/// `false` when either entry's identifier field is absent or undecodable.
	pub fn matches_entry(&self, other: &Element) -> bool {
		match (self.decoded_target_id(), other.decoded_target_id()) {
			(Some(own), Some(theirs)) => own == theirs,
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::context::ElementType;
	use crate::element::Element;
	use crate::error::ErrorKind;
	use crate::segment::Segment;

	fn placed_segment() -> Segment {
		let mut segment = Segment::new();
		segment.set_position(0);
		segment
	}

	fn placed(ty: ElementType, position: u64) -> Element {
		let mut element = Element::master(ty);
		element.set_position(position);
		element
	}

	#[test_log::test]
	fn indexing_is_append_only() {
		let segment = placed_segment();
		let cluster = placed(ElementType::Cluster, 100);

		let mut head = Element::master(ElementType::SeekHead);
		let first = head.index_this(&cluster, &segment).unwrap();
		let second = head.index_this(&cluster, &segment).unwrap();
		let third = head.index_this(&cluster, &segment).unwrap();

		// No deduplication: three calls, three entries, in call order
		assert_eq!(head.child_count(), 3);
		let order = head.children().map(|(id, _)| id).collect::<Vec<_>>();
		assert_eq!(order, vec![first, second, third]);
	}

	#[test_log::test]
	fn entries_snapshot_type_and_relative_position() {
		// Header is 9 bytes, so content starts at 9
		let segment = placed_segment();
		let tracks = placed(ElementType::Tracks, 47);

		let mut head = Element::master(ElementType::SeekHead);
		let entry = head.index_this(&tracks, &segment).unwrap();
		let entry = head.child(entry).unwrap();

		assert_eq!(entry.location(), 38);
		assert_eq!(entry.target_position(), Some(38));
		assert_eq!(entry.target_id().unwrap(), Some(ElementType::Tracks.id()));

		// The stored identifier is the minimal 4-byte form
		let id_leaf = entry.find_first(ElementType::SeekId).unwrap();
		assert_eq!(
			entry.child(id_leaf).unwrap().as_binary(),
			Some(&[0x16, 0x54, 0xAE, 0x6B][..])
		);
	}

	#[test_log::test]
	fn indexing_requires_positions() {
		let segment = placed_segment();
		let unplaced = Element::master(ElementType::Cluster);

		let mut head = Element::master(ElementType::SeekHead);
		let err = head.index_this(&unplaced, &segment).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::NotPlaced(_)));

		let unplaced_segment = Segment::new();
		let cluster = placed(ElementType::Cluster, 100);
		let err = head.index_this(&cluster, &unplaced_segment).unwrap_err();
		assert!(matches!(err.kind(), ErrorKind::NotPlaced(_)));
	}

	#[test_log::test]
	fn lookup_chains_through_same_type_entries() {
		let segment = placed_segment();
		let first_tracks = placed(ElementType::Tracks, 20);
		let cues = placed(ElementType::Cues, 30);
		let second_tracks = placed(ElementType::Tracks, 40);

		let mut head = Element::master(ElementType::SeekHead);
		let first = head.index_this(&first_tracks, &segment).unwrap();
		let middle = head.index_this(&cues, &segment).unwrap();
		let last = head.index_this(&second_tracks, &segment).unwrap();

		assert_eq!(head.find_first_of(ElementType::Tracks), Some(first));
		assert_eq!(head.find_next_of(first), Some(last));
		assert_eq!(head.find_next_of(last), None);

		assert_eq!(head.find_first_of(ElementType::Cues), Some(middle));
		assert_eq!(head.find_next_of(middle), None);

		assert_eq!(head.find_first_of(ElementType::Chapters), None);
	}

	#[test_log::test]
	fn find_next_of_requires_an_entry_of_this_head() {
		let segment = placed_segment();
		let cluster = placed(ElementType::Cluster, 50);

		let mut head = Element::master(ElementType::SeekHead);
		head.index_this(&cluster, &segment).unwrap();

		let mut other = Element::master(ElementType::SeekHead);
		let foreign = other.index_this(&cluster, &segment).unwrap();

		assert_eq!(head.find_next_of(foreign), None);
	}

	#[test_log::test]
	fn entries_without_an_identifier_are_skipped() {
		let segment = placed_segment();
		let cluster = placed(ElementType::Cluster, 64);

		let mut head = Element::master(ElementType::SeekHead);

		// An entry holding only a position: invisible to lookups, but not an error
		let mut blind = Element::master(ElementType::Seek);
		blind
			.push(Element::uint(ElementType::SeekPosition, 12))
			.unwrap();
		let blind = head.push(blind).unwrap();

		let real = head.index_this(&cluster, &segment).unwrap();

		assert_eq!(head.find_first_of(ElementType::Cluster), Some(real));
		assert_eq!(head.find_next_of(blind), None);

		let blind = head.child(blind).unwrap();
		assert!(!blind.matches_identifier(ElementType::Cluster.id()));
		assert!(!blind.matches_entry(head.child(real).unwrap()));
		assert!(!head.child(real).unwrap().matches_entry(blind));
		assert_eq!(blind.target_id().unwrap(), None);
	}

	#[test_log::test]
	fn corrupt_identifiers_are_unmatchable() {
		let mut head = Element::master(ElementType::SeekHead);

		// Five bytes is outside the legal 1..=4 identifier range
		let mut corrupt = Element::master(ElementType::Seek);
		corrupt
			.push(Element::binary(
				ElementType::SeekId,
				vec![0x01, 0x02, 0x03, 0x04, 0x05],
			))
			.unwrap();
		corrupt
			.push(Element::uint(ElementType::SeekPosition, 7))
			.unwrap();
		let corrupt = head.push(corrupt).unwrap();

		assert_eq!(head.find_first_of(ElementType::Cluster), None);
		assert_eq!(head.find_next_of(corrupt), None);

		let corrupt = head.child(corrupt).unwrap();
		assert!(matches!(
			corrupt.target_id().unwrap_err().kind(),
			ErrorKind::IndexCorrupt
		));
		assert!(!corrupt.matches_identifier(ElementType::Cluster.id()));

		// The position is intact even though the identifier is not
		assert_eq!(corrupt.location(), 7);
	}

	#[test_log::test]
	fn location_zero_is_ambiguous_without_target_position() {
		let mut head = Element::master(ElementType::SeekHead);

		let empty = head.push(Element::master(ElementType::Seek)).unwrap();
		let empty = head.child(empty).unwrap();
		assert_eq!(empty.location(), 0);
		assert_eq!(empty.target_position(), None);

		let mut at_zero = Element::master(ElementType::Seek);
		at_zero
			.push(Element::uint(ElementType::SeekPosition, 0))
			.unwrap();
		let at_zero = head.push(at_zero).unwrap();
		let at_zero = head.child(at_zero).unwrap();
		assert_eq!(at_zero.location(), 0);
		assert_eq!(at_zero.target_position(), Some(0));
	}

	#[test_log::test]
	fn matching_compares_canonical_identifiers() {
		let segment = placed_segment();
		let cluster = placed(ElementType::Cluster, 30);
		let tracks = placed(ElementType::Tracks, 60);

		let mut head = Element::master(ElementType::SeekHead);
		let cluster_entry = head.index_this(&cluster, &segment).unwrap();
		let tracks_entry = head.index_this(&tracks, &segment).unwrap();

		let cluster_entry = head.child(cluster_entry).unwrap();
		let tracks_entry = head.child(tracks_entry).unwrap();

		assert!(cluster_entry.matches_identifier(ElementType::Cluster.id()));
		assert!(!cluster_entry.matches_identifier(ElementType::Tracks.id()));
		assert!(!cluster_entry.matches_entry(tracks_entry));
		assert!(cluster_entry.matches_entry(cluster_entry));
	}
}

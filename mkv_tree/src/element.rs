//! The generic element-tree model
//!
//! An [`Element`] is one typed node of the container tree: a leaf carrying an unsigned
//! integer or raw binary payload, or a master owning an ordered sequence of children.
//! Nodes record the absolute byte position they were written to or parsed from, and a
//! payload size that stays [`VInt::UNKNOWN`] while the element is still open for
//! streamed writing.

use crate::context::{ElementContext, ElementDataKind, ElementType};
use crate::error::{ErrorKind, MkvError, Result};
use crate::segment::SegmentToken;
use crate::vint::{VInt, uint_octet_length};

use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a child element within its owning master
///
/// Handles are allocated in append order from a process-wide counter and are never
/// reused, so "the child I was handed earlier" stays well-defined even when two
/// children have identical contents. Cloning a master preserves its children's
/// handles.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ChildId(u64);

impl ChildId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(0);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// The payload of an element
#[derive(Clone, Debug, PartialEq)]
pub enum ElementData {
	/// An ordered sequence of owned child elements
	Master(Children),
	/// A big-endian unsigned integer
	UnsignedInt(u64),
	/// Raw binary data
	Binary(Vec<u8>),
}

/// The ordered, append-only children of a master element
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Children {
	nodes: Vec<(ChildId, Element)>,
}

impl Children {
	fn append(&mut self, element: Element) -> ChildId {
		let id = ChildId::next();
		self.nodes.push((id, element));
		id
	}

	fn index_of(&self, id: ChildId) -> Option<usize> {
		self.nodes.iter().position(|(child_id, _)| *child_id == id)
	}

	/// The number of owned children
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Whether there are no children
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Iterates the children in stream order
	pub fn iter(&self) -> impl Iterator<Item = (ChildId, &Element)> {
		self.nodes.iter().map(|(id, element)| (*id, element))
	}
}

/// One typed node of the container tree
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
	ty: ElementType,
	position: Option<u64>,
	size: VInt,
	data: ElementData,
	// Clusters keep a weak handle to their owning segment; `None` for everything else
	segment: Option<SegmentToken>,
}

impl Element {
	/// Creates an empty master element of `ty`, open for appending
	///
	/// # Panics
	///
	/// Panics if `ty` does not declare a master payload.
	pub fn master(ty: ElementType) -> Self {
		assert_eq!(
			ty.kind(),
			ElementDataKind::Master,
			"{} is not a master element",
			ty.name()
		);

		Self {
			ty,
			position: None,
			size: VInt::UNKNOWN,
			data: ElementData::Master(Children::default()),
			segment: None,
		}
	}

	/// Creates an unsigned integer leaf of `ty`
	///
	/// The payload size is the minimal big-endian encoding of `value` (at least one
	/// octet).
	///
	/// # Panics
	///
	/// Panics if `ty` does not declare an unsigned integer payload.
	pub fn uint(ty: ElementType, value: u64) -> Self {
		assert_eq!(
			ty.kind(),
			ElementDataKind::UnsignedInt,
			"{} is not an unsigned integer element",
			ty.name()
		);

		Self {
			ty,
			position: None,
			size: VInt(u64::from(uint_octet_length(value))),
			data: ElementData::UnsignedInt(value),
			segment: None,
		}
	}

	/// Creates a binary leaf of `ty`
	///
	/// # Panics
	///
	/// Panics if `ty` does not declare a binary payload.
	pub fn binary(ty: ElementType, data: Vec<u8>) -> Self {
		assert_eq!(
			ty.kind(),
			ElementDataKind::Binary,
			"{} is not a binary element",
			ty.name()
		);

		Self {
			ty,
			position: None,
			size: VInt(data.len() as u64),
			data: ElementData::Binary(data),
			segment: None,
		}
	}

	/// The element's type
	#[inline]
	pub fn ty(&self) -> ElementType {
		self.ty
	}

	/// The element's static context descriptor
	#[inline]
	pub fn context(&self) -> &'static ElementContext {
		self.ty.context()
	}

	/// The absolute byte position of the element's first identifier byte
	///
	/// `None` until the element has been written to or parsed from a stream.
	#[inline]
	pub fn position(&self) -> Option<u64> {
		self.position
	}

	/// Records the absolute byte position of the element
	///
	/// Normally done by [`ElementWriter`](crate::ElementWriter) and
	/// [`ElementReader`](crate::ElementReader); exposed for callers that track stream
	/// positions themselves.
	#[inline]
	pub fn set_position(&mut self, position: u64) {
		self.position = Some(position);
	}

	/// The element's payload size
	///
	/// [`VInt::UNKNOWN`] while the element is still open for streamed writing.
	#[inline]
	pub fn size(&self) -> VInt {
		self.size
	}

	pub(crate) fn set_size(&mut self, size: VInt) {
		self.size = size;
	}

	/// The element's payload
	#[inline]
	pub fn data(&self) -> &ElementData {
		&self.data
	}

	/// Whether the element owns children
	#[inline]
	pub fn is_master(&self) -> bool {
		matches!(self.data, ElementData::Master(_))
	}

	/// The unsigned integer payload, if this is an unsigned integer leaf
	pub fn as_uint(&self) -> Option<u64> {
		match self.data {
			ElementData::UnsignedInt(value) => Some(value),
			_ => None,
		}
	}

	/// The binary payload, if this is a binary leaf
	pub fn as_binary(&self) -> Option<&[u8]> {
		match &self.data {
			ElementData::Binary(data) => Some(data),
			_ => None,
		}
	}

	/// The weak handle to the owning segment, for cluster elements that have one
	pub fn owning_segment(&self) -> Option<SegmentToken> {
		self.segment
	}

	pub(crate) fn set_owning_segment(&mut self, segment: Option<SegmentToken>) {
		self.segment = segment;
	}

	fn child_nodes(&self) -> &[(ChildId, Element)] {
		match &self.data {
			ElementData::Master(children) => &children.nodes,
			_ => &[],
		}
	}

	pub(crate) fn child_nodes_mut(&mut self) -> &mut [(ChildId, Element)] {
		match &mut self.data {
			ElementData::Master(children) => &mut children.nodes,
			_ => &mut [],
		}
	}

	/// Checks that `ty` could be appended to this element right now
	///
	/// # Errors
	///
	/// * [`ErrorKind::NotAMaster`] when this element is a leaf
	/// * [`ErrorKind::InvalidChild`] when the context rules do not list `ty`
	/// * [`ErrorKind::DuplicateChild`] when `ty` is non-repeatable and already present
	pub fn validate_child(&self, ty: ElementType) -> Result<()> {
		if !self.is_master() {
			return Err(MkvError::new(ErrorKind::NotAMaster(self.ty.name())));
		}

		let Some(rule) = self.ty.child_rule(ty) else {
			return Err(MkvError::new(ErrorKind::InvalidChild {
				parent: self.ty.name(),
				child: ty.name(),
			}));
		};

		if !rule.repeatable && self.find_first(ty).is_some() {
			return Err(MkvError::new(ErrorKind::DuplicateChild {
				parent: self.ty.name(),
				child: ty.name(),
			}));
		}

		Ok(())
	}

	/// Appends `child`, transferring ownership to this master
	///
	/// Children keep the order they were appended in, which is their intended stream
	/// order. Returns the new child's stable handle.
	///
	/// # Errors
	///
	/// See [`Element::validate_child`].
	pub fn push(&mut self, child: Element) -> Result<ChildId> {
		self.validate_child(child.ty())?;

		log::trace!("Appending {} to {}", child.ty().name(), self.ty.name());

		let ElementData::Master(children) = &mut self.data else {
			// validate_child already rejected leaves
			unreachable!()
		};

		Ok(children.append(child))
	}

	/// Finds the first child of `ty`, scanning in stream order
	///
	/// `None` when there is no such child, or when this element is a leaf.
	pub fn find_first(&self, ty: ElementType) -> Option<ChildId> {
		self.child_nodes()
			.iter()
			.find(|(_, element)| element.ty == ty)
			.map(|(id, _)| *id)
	}

	/// Finds the first child of `ty` strictly after the child identified by `after`
	///
	/// The starting point is located by identity, not by value: `None` when `after`
	/// does not belong to this master, or when no later child matches.
	pub fn find_next(&self, ty: ElementType, after: ChildId) -> Option<ChildId> {
		let ElementData::Master(children) = &self.data else {
			return None;
		};
		let start = children.index_of(after)?;

		children.nodes[start + 1..]
			.iter()
			.find(|(_, element)| element.ty == ty)
			.map(|(id, _)| *id)
	}

	/// Borrows the child identified by `id`
	pub fn child(&self, id: ChildId) -> Option<&Element> {
		self.child_nodes()
			.iter()
			.find(|(child_id, _)| *child_id == id)
			.map(|(_, element)| element)
	}

	/// Mutably borrows the child identified by `id`
	pub fn child_mut(&mut self, id: ChildId) -> Option<&mut Element> {
		self.child_nodes_mut()
			.iter_mut()
			.find(|(child_id, _)| *child_id == id)
			.map(|(_, element)| element)
	}

	/// Iterates the children in stream order
	pub fn children(&self) -> impl Iterator<Item = (ChildId, &Element)> {
		self.child_nodes().iter().map(|(id, element)| (*id, element))
	}

	/// The number of owned children (zero for leaves)
	pub fn child_count(&self) -> usize {
		self.child_nodes().len()
	}

	/// Mandatory child types with no occurrence under this master
	///
	/// Empty for leaves and for masters satisfying all of their mandatory rules.
	pub fn missing_children(&self) -> Vec<ElementType> {
		self.ty
			.context()
			.children
			.iter()
			.filter(|rule| rule.mandatory && self.find_first(rule.ty).is_none())
			.map(|rule| rule.ty)
			.collect()
	}

	/// Checks that every mandatory child rule is satisfied
	///
	/// # Errors
	///
	/// * [`ErrorKind::MissingChild`] naming the first unsatisfied rule
	pub fn check_mandatory(&self) -> Result<()> {
		if let Some(ty) = self.missing_children().into_iter().next() {
			return Err(MkvError::new(ErrorKind::MissingChild {
				parent: self.ty.name(),
				child: ty.name(),
			}));
		}

		Ok(())
	}
}

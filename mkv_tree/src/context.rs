//! Static element context metadata
//!
//! Every element type this crate models has exactly one [`ElementContext`]: its wire
//! identifier, display name, legal parent, payload kind, and the occurrence rules for
//! its legal children. The descriptors are compile-time constants, shared read-only
//! process-wide, and never mutated at runtime.

use crate::vint::ElementId;

/// The payload kind an element type carries
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ElementDataKind {
	/// An ordered sequence of child elements
	Master,
	/// A big-endian unsigned integer
	UnsignedInt,
	/// Raw binary data
	Binary,
}

/// Occurrence rule for one legal child type
#[derive(Copy, Clone, Debug)]
pub struct ChildRule {
	/// The child element type
	pub ty: ElementType,
	/// Whether at least one occurrence is required
	pub mandatory: bool,
	/// Whether more than one occurrence is allowed
	pub repeatable: bool,
}

/// Static metadata describing one element type
#[derive(Debug)]
pub struct ElementContext {
	/// The type's wire identifier
	pub id: ElementId,
	/// Human-readable display name
	pub name: &'static str,
	/// The legal parent type (`None` for top-level types)
	pub parent: Option<ElementType>,
	/// The payload kind
	pub kind: ElementDataKind,
	/// Legal child types with their occurrence rules, in declaration order
	pub children: &'static [ChildRule],
}

// This macro defines the closed set of element types and their context descriptors.
//
// It generates the `ElementType` enum, one `static` `ElementContext` per type, and the
// `ElementType::context`/`ElementType::from_id` lookups.
//
// To define an element type, use the following syntax:
//
// Variant: {
//     id: 0x1234_5678,
//     kind: Master,
//     parent: Some(ElementType::Parent),
//     name: "Variant",
//     children: [
//         ChildVariant: { mandatory: false, repeatable: true },
//     ],
// },
//
// Leaf types declare an empty `children` list.
macro_rules! element_contexts {
	($(
		$variant:ident: {
			id: $id:literal,
			kind: $kind:ident,
			parent: $parent:expr,
			name: $name:literal,
			children: [$($child:ident: { mandatory: $mandatory:literal, repeatable: $repeatable:literal }),* $(,)?] $(,)?
		}
	),* $(,)?) => {
		paste::paste! {
			/// The closed set of element types this crate models
			#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
			pub enum ElementType {
				$(
					#[doc = "The `" $variant "` element"]
					$variant
				),*
			}

			$(
				static [<$variant:upper _CONTEXT>]: ElementContext = ElementContext {
					id: ElementId($id),
					name: $name,
					parent: $parent,
					kind: ElementDataKind::$kind,
					children: &[
						$(
							ChildRule {
								ty: ElementType::$child,
								mandatory: $mandatory,
								repeatable: $repeatable,
							}
						),*
					],
				};
			)*

			impl ElementType {
				/// Every element type, in declaration order
				pub const ALL: &'static [ElementType] = &[$(ElementType::$variant),*];

				/// Returns the static context descriptor for this type
				pub fn context(self) -> &'static ElementContext {
					match self {
						$(Self::$variant => &[<$variant:upper _CONTEXT>]),*
					}
				}

				/// Looks up the element type declaring `id`, if any
				pub fn from_id(id: ElementId) -> Option<Self> {
					match id.value() {
						$($id => Some(Self::$variant),)*
						_ => None,
					}
				}
			}
		}
	};
}

element_contexts! {
	// The Root Element that contains all other Top-Level Elements
	Segment: {
		id: 0x1853_8067,
		kind: Master,
		parent: None,
		name: "Segment",
		children: [
			Cluster:     { mandatory: false, repeatable: true },
			SeekHead:    { mandatory: false, repeatable: true },
			Cues:        { mandatory: false, repeatable: false },
			Tracks:      { mandatory: false, repeatable: true },
			Info:        { mandatory: true,  repeatable: false },
			Chapters:    { mandatory: false, repeatable: false },
			Attachments: { mandatory: false, repeatable: false },
			Tags:        { mandatory: false, repeatable: false },
		],
	},

	// segment.seekHead
	SeekHead: {
		id: 0x114D_9B74,
		kind: Master,
		parent: Some(ElementType::Segment),
		name: "SeekHead",
		children: [
			Seek: { mandatory: true, repeatable: true },
		],
	},

	// segment.seekHead.seek
	Seek: {
		id: 0x4DBB,
		kind: Master,
		parent: Some(ElementType::SeekHead),
		name: "Seek",
		children: [
			SeekId:       { mandatory: true, repeatable: false },
			SeekPosition: { mandatory: true, repeatable: false },
		],
	},

	SeekId: {
		id: 0x53AB,
		kind: Binary,
		parent: Some(ElementType::Seek),
		name: "SeekID",
		children: [],
	},

	SeekPosition: {
		id: 0x53AC,
		kind: UnsignedInt,
		parent: Some(ElementType::Seek),
		name: "SeekPosition",
		children: [],
	},

	// The remaining Top-Level Elements are opaque to this crate: they participate in
	// context validation and seek indexing, but their interiors are not modeled.
	Cluster: {
		id: 0x1F43_B675,
		kind: Master,
		parent: Some(ElementType::Segment),
		name: "Cluster",
		children: [],
	},

	Cues: {
		id: 0x1C53_BB6B,
		kind: Master,
		parent: Some(ElementType::Segment),
		name: "Cues",
		children: [],
	},

	Tracks: {
		id: 0x1654_AE6B,
		kind: Master,
		parent: Some(ElementType::Segment),
		name: "Tracks",
		children: [],
	},

	Info: {
		id: 0x1549_A966,
		kind: Master,
		parent: Some(ElementType::Segment),
		name: "Info",
		children: [],
	},

	Chapters: {
		id: 0x1043_A770,
		kind: Master,
		parent: Some(ElementType::Segment),
		name: "Chapters",
		children: [],
	},

	Attachments: {
		id: 0x1941_A469,
		kind: Master,
		parent: Some(ElementType::Segment),
		name: "Attachments",
		children: [],
	},

	Tags: {
		id: 0x1254_C367,
		kind: Master,
		parent: Some(ElementType::Segment),
		name: "Tags",
		children: [],
	},
}

impl ElementType {
	/// The type's wire identifier
	#[inline]
	pub fn id(self) -> ElementId {
		self.context().id
	}

	/// The type's display name
	#[inline]
	pub fn name(self) -> &'static str {
		self.context().name
	}

	/// The payload kind declared by the type's context
	#[inline]
	pub fn kind(self) -> ElementDataKind {
		self.context().kind
	}

	/// Looks up the occurrence rule this type declares for `child`
	///
	/// `None` means `child` is not a legal child of this type.
	pub fn child_rule(self, child: ElementType) -> Option<&'static ChildRule> {
		self.context().children.iter().find(|rule| rule.ty == child)
	}
}

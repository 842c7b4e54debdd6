//! Contains the errors that can arise within the crate
//!
//! The primary error is [`MkvError`]. The type of error is determined by [`ErrorKind`],
//! which can be extended at any time.

use std::fmt::{Debug, Display, Formatter};

/// Alias for `Result<T, MkvError>`
pub type Result<T> = std::result::Result<T, MkvError>;

/// The types of errors that can occur
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
	// Codec related errors
	/// A variable-length integer could not be represented within its octet limits
	BadVintSize,
	/// An element identifier had a byte length outside of `1..=4`, or no significant bits
	BadIdLength(usize),

	// Index related errors
	/// A seek entry's stored target identifier could not be decoded
	///
	/// Entries in this state are skipped by the lookup operations rather than matched.
	IndexCorrupt,

	// Structural-validity errors
	/// Attempted to place a child under a parent whose context does not allow it
	InvalidChild {
		/// Display name of the parent type
		parent: &'static str,
		/// Display name of the rejected child type
		child: &'static str,
	},
	/// A non-repeatable child type was added a second time
	DuplicateChild {
		/// Display name of the parent type
		parent: &'static str,
		/// Display name of the repeated child type
		child: &'static str,
	},
	/// A mandatory child type has no occurrence under its parent
	MissingChild {
		/// Display name of the parent type
		parent: &'static str,
		/// Display name of the missing child type
		child: &'static str,
	},
	/// A child operation was attempted on a non-master element
	NotAMaster(&'static str),

	// Addressing errors
	/// Position arithmetic needed a stream position that has not been recorded
	NotPlaced(&'static str),
	/// A finalized size does not fit the segment's fixed-width size field
	TooMuchData,

	// Parsing errors
	/// Malformed byte input encountered while decoding a stream
	Decode(&'static str),

	// Conversions for external errors
	/// Represents all cases of [`std::io::Error`].
	Io(std::io::Error),
}

/// Errors that could occur within the crate
pub struct MkvError {
	pub(crate) kind: ErrorKind,
}

impl MkvError {
	/// Create a `MkvError` from an [`ErrorKind`]
	#[must_use]
	pub const fn new(kind: ErrorKind) -> Self {
		Self { kind }
	}

	/// Returns the [`ErrorKind`]
	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}
}

impl std::error::Error for MkvError {}

impl Debug for MkvError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self.kind)
	}
}

impl From<std::io::Error> for MkvError {
	fn from(input: std::io::Error) -> Self {
		Self {
			kind: ErrorKind::Io(input),
		}
	}
}

impl Display for MkvError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self.kind {
			// Conversions
			ErrorKind::Io(ref err) => write!(f, "{err}"),

			ErrorKind::BadVintSize => write!(f, "Encountered an invalid variable-length integer"),
			ErrorKind::BadIdLength(length) => write!(
				f,
				"Element identifiers must occupy 1 to 4 bytes, got {length}"
			),
			ErrorKind::IndexCorrupt => {
				write!(f, "A seek entry holds an undecodable target identifier")
			},
			ErrorKind::InvalidChild { parent, child } => {
				write!(f, "A {child} element is not a legal child of {parent}")
			},
			ErrorKind::DuplicateChild { parent, child } => write!(
				f,
				"{parent} allows a single {child} child, attempted to add another"
			),
			ErrorKind::MissingChild { parent, child } => {
				write!(f, "{parent} is missing its mandatory {child} child")
			},
			ErrorKind::NotAMaster(name) => {
				write!(f, "{name} is not a master element and cannot own children")
			},
			ErrorKind::NotPlaced(name) => write!(
				f,
				"{name} has no usable stream position for the requested arithmetic"
			),
			ErrorKind::TooMuchData => write!(
				f,
				"The finalized size does not fit the segment's fixed-width size field"
			),
			ErrorKind::Decode(message) => write!(f, "Stream decoding: {message}"),
		}
	}
}

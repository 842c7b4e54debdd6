//! The structural core of Matroska/EBML streams.
//!
//! This crate models the container skeleton of an EBML-derived Matroska stream: a tree
//! of typed, variable-length-tagged elements with byte-level addressing, the top-level
//! [`Segment`] whose position arithmetic stays stable while its total size is still
//! unknown, and the seek-head index that lets a reader jump straight to a top-level
//! section.
//!
//! It does **not** interpret media: tracks, clusters, cues, chapters, attachments, and
//! tags are modeled only as opaque top-level sections that can be placed, sized, and
//! indexed.
//!
//! # Examples
//!
//! Building a segment and indexing a section:
//!
//! ```rust
//! use mkv_tree::{Element, ElementType, Segment};
//!
//! # fn main() -> mkv_tree::error::Result<()> {
//! let mut segment = Segment::new();
//! segment.set_position(0);
//!
//! // The stream collaborator placed a cluster at absolute offset 100
//! let mut cluster = Element::master(ElementType::Cluster);
//! cluster.set_position(100);
//! let cluster = segment.push(cluster)?;
//!
//! let mut seek_head = Element::master(ElementType::SeekHead);
//! seek_head.index_this(segment.child(cluster).unwrap(), &segment)?;
//!
//! // The segment's header is 9 bytes, so the cluster sits 91 bytes into the content
//! let entry = seek_head.find_first_of(ElementType::Cluster).unwrap();
//! assert_eq!(seek_head.child(entry).unwrap().location(), 91);
//! assert_eq!(segment.global_position(91), Some(100));
//! # Ok(()) }
//! ```
//!
//! Writing a stream while indexing it, then reading it back:
//!
//! ```rust
//! use mkv_tree::{Element, ElementReader, ElementType, ElementWriter, Segment};
//! use std::io::Cursor;
//!
//! # fn main() -> mkv_tree::error::Result<()> {
//! let mut writer = ElementWriter::new(Vec::new());
//! let mut segment = Segment::new();
//! writer.begin_segment(&mut segment)?;
//!
//! let tracks = writer.append_child(&mut segment, Element::master(ElementType::Tracks))?;
//!
//! let mut seek_head = Element::master(ElementType::SeekHead);
//! seek_head.index_this(segment.child(tracks).unwrap(), &segment)?;
//! writer.append_child(&mut segment, seek_head)?;
//!
//! let mut reader = ElementReader::new(Cursor::new(writer.into_inner()));
//! let reread = reader.read_segment()?;
//!
//! let head = reread.find_first(ElementType::SeekHead).unwrap();
//! let head = reread.child(head).unwrap();
//! let entry = head.find_first_of(ElementType::Tracks).unwrap();
//! let relative = head.child(entry).unwrap().location();
//!
//! let tracks = reread.find_first(ElementType::Tracks).unwrap();
//! assert_eq!(
//! 	reread.global_position(relative),
//! 	reread.child(tracks).unwrap().position()
//! );
//! # Ok(()) }
//! ```

mod context;
mod element;
pub mod error;
mod macros;
mod read;
mod seek;
mod segment;
mod vint;
mod write;

pub use context::{ChildRule, ElementContext, ElementDataKind, ElementType};
pub use element::{ChildId, Children, Element, ElementData};
pub use read::ElementReader;
pub use segment::{DEFAULT_SIZE_LENGTH, Segment, SegmentToken};
pub use vint::{ElementId, VInt};
pub use write::ElementWriter;

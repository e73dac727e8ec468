//! # Tagged Tree
//!
//! The intermediate form between an object graph and its text.
//!
//! The encoder produces a `TaggedNode` tree from a heap; `wire` renders it as
//! JSON. On the way back, `wire` parses JSON into a tree and the decoder
//! rebuilds a heap from it.

use crate::{Scalar, SequenceKind, TypeTag};

/// Wire form of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapForm {
    /// A native JSON object. Every key is a text scalar outside the reserved
    /// namespace.
    Text,
    /// `{"$entries": [[key, value], ...]}`.
    Entries,
}

/// A node in the tagged tree.
///
/// Composite nodes carry the reference index assigned on their first
/// occurrence, or `None` when reference tracking is off.
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedNode {
    Scalar(Scalar),
    Sequence {
        index: Option<usize>,
        kind: SequenceKind,
        items: Vec<TaggedNode>,
    },
    Mapping {
        index: Option<usize>,
        form: MapForm,
        entries: Vec<(TaggedNode, TaggedNode)>,
    },
    Typed {
        index: Option<usize>,
        tag: TypeTag,
        fields: Vec<(String, TaggedNode)>,
    },
    /// Reference to the composite node that declared this index.
    BackRef(usize),
}

impl TaggedNode {
    pub const NULL: Self = Self::Scalar(Scalar::Null);

    /// The reference index declared by this node, if any.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::Sequence { index, .. }
            | Self::Mapping { index, .. }
            | Self::Typed { index, .. } => *index,
            Self::Scalar(_) | Self::BackRef(_) => None,
        }
    }

    /// The text content, if this node is a text scalar.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }
}

/// A parsed document: the tree plus the number of indices it declares.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: TaggedNode,
    /// Declared indices are exactly `0..declared`.
    pub declared: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_of_composites_only() {
        let typed = TaggedNode::Typed {
            index: Some(4),
            tag: TypeTag::new("t.T"),
            fields: Vec::new(),
        };
        assert_eq!(typed.index(), Some(4));
        assert_eq!(TaggedNode::BackRef(4).index(), None);
        assert_eq!(TaggedNode::NULL.index(), None);
    }
}

//! Cell comments (notes)
//!
//! Comments are annotations attached to cells. They relocate with structural
//! edits and round-trip through undo like any other cell-anchored state.

/// A cell comment/note
#[derive(Debug, Clone, PartialEq)]
pub struct CellComment {
    /// Author of the comment
    pub author: String,
    /// Comment text content
    pub text: String,
}

impl CellComment {
    /// Create a new comment with the given author and text
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }

    /// Create a comment with just text (empty author)
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            author: String::new(),
            text: text.into(),
        }
    }

    /// Check if this comment has an author
    pub fn has_author(&self) -> bool {
        !self.author.is_empty()
    }
}

impl std::fmt::Display for CellComment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_author() {
            write!(f, "[{}]: {}", self.author, self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

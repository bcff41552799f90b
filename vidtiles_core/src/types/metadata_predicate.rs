//! The `MetadataPredicate` enum: what a selection query asks the semantic
//! index for.

use crate::error::VidtilesError;
use anyhow::{Result, bail};
use std::fmt;

/// A content predicate over the semantic index.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum MetadataPredicate {
	/// Frames containing at least one object with this label.
	Label(String),
	/// Frames containing any indexed object.
	AnyObject,
}

impl MetadataPredicate {
	/// Creates a label predicate.
	#[must_use]
	pub fn label(label: &str) -> MetadataPredicate {
		MetadataPredicate::Label(label.to_string())
	}

	/// Rejects malformed predicates before any catalog or index work starts.
	pub fn validate(&self) -> Result<()> {
		if let MetadataPredicate::Label(label) = self {
			if label.trim().is_empty() {
				bail!(VidtilesError::InvalidPredicate("empty label".to_string()));
			}
		}
		Ok(())
	}

	/// Returns `true` if `label` satisfies the predicate.
	#[must_use]
	pub fn matches_label(&self, label: &str) -> bool {
		match self {
			MetadataPredicate::Label(wanted) => wanted == label,
			MetadataPredicate::AnyObject => true,
		}
	}
}

impl fmt::Debug for MetadataPredicate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MetadataPredicate::Label(label) => write!(f, "label == {label:?}"),
			MetadataPredicate::AnyObject => write!(f, "any object"),
		}
	}
}

//! The [`Blob`] struct, a thin wrapper around [`Vec<u8>`] used as the currency
//! for encoded tile data and serialized descriptors.

use std::fmt::Debug;

/// A byte buffer holding encoded video data or a serialized descriptor.
///
/// # Examples
///
/// ```rust
/// use vidtiles_core::Blob;
///
/// let blob = Blob::from("annex-b bytes");
/// assert_eq!(blob.len(), 13);
/// assert!(!blob.is_empty());
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
	/// Creates an empty `Blob`.
	#[must_use]
	pub fn new_empty() -> Blob {
		Blob(Vec::new())
	}

	/// Creates a zero-filled `Blob` of the given length.
	#[must_use]
	pub fn new_sized(length: usize) -> Blob {
		Blob(vec![0u8; length])
	}

	/// Returns a reference to the underlying byte slice.
	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		self.0.as_ref()
	}

	/// Returns a mutable reference to the underlying byte slice.
	pub fn as_mut_slice(&mut self) -> &mut [u8] {
		self.0.as_mut()
	}

	/// Consumes the `Blob` and returns the underlying vector.
	#[must_use]
	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}

	/// Appends another blob's bytes to this one.
	pub fn append(&mut self, other: &Blob) {
		self.0.extend_from_slice(other.as_slice());
	}

	/// Returns the length in bytes.
	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` if the blob holds no bytes.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<Vec<u8>> for Blob {
	fn from(vec: Vec<u8>) -> Blob {
		Blob(vec)
	}
}

impl From<&[u8]> for Blob {
	fn from(slice: &[u8]) -> Blob {
		Blob(slice.to_vec())
	}
}

impl From<&str> for Blob {
	fn from(text: &str) -> Blob {
		Blob(text.as_bytes().to_vec())
	}
}

impl Debug for Blob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Blob({} bytes)", self.0.len())
	}
}

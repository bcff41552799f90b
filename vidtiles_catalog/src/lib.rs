//! The on-disk catalog: entries, committed version directories, tile
//! location lookup, and the cracking transaction.
//!
//! Layout on disk, under a configured root:
//!
//! ```text
//! <root>/<entry>/
//!   tile-version              # ASCII unsigned integer, highest committed version
//!   <entry>-<version>/
//!     layout                  # serialized TileLayout
//!     frame-range             # "<firstFrame> <lastFrame>\n"
//!     <tile>.{h264|hevc}      # one file per tile
//! ```
//!
//! A version directory is committed iff `layout` and `frame-range` exist and
//! `tile-version` references a value at least as large as the directory's
//! version. `tile-version` is only ever updated write-then-rename, so readers
//! see either the whole new version or none of it.

mod entry;
pub use entry::*;

mod location;
pub use location::*;

mod transaction;
pub use transaction::*;

mod version;
pub use version::*;

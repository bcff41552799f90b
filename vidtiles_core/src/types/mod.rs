//! Value types shared across the catalog and pipeline crates.

mod blob;
pub use blob::*;

mod codec;
pub use codec::*;

mod cost_elements;
pub use cost_elements::*;

mod frame_range;
pub use frame_range::*;

mod metadata_predicate;
pub use metadata_predicate::*;

mod object_box;
pub use object_box::*;

mod pixel_buffer;
pub use pixel_buffer::*;

mod rectangle;
pub use rectangle::*;

mod tile_layout;
pub use tile_layout::*;

mod video_configuration;
pub use video_configuration::*;

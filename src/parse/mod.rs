pub mod region;
pub mod tags;

pub use region::{
    RegionBounds, current_body, empty_region, insert_at_line, locate, remove_region, write_region,
};
pub use tags::{extract_tags, frontmatter_tags, strip_generated};

pub mod glyphs;
pub mod image_helper;
pub mod palette;

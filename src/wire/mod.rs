pub mod codec;
pub mod dumper;
pub mod params;
pub mod response;

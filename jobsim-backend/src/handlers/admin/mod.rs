pub mod params;
pub mod reset;

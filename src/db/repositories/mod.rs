pub mod cleanings;
pub mod magnets;
pub mod sessions;

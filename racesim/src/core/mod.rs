pub mod competitor;
pub mod handle_race;
pub mod network;
pub mod obstacle;
pub mod race;
pub mod race_handle;
pub mod speed;

pub mod replays;
pub mod sessions;

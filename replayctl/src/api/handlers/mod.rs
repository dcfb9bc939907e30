pub mod projects;
pub mod replays;
pub mod runs;
pub mod sessions;

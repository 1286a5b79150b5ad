pub mod dates;
pub mod dedup;
pub mod graph;
pub mod hosts;
pub mod rank;
pub mod records;
pub mod references;
pub mod text;
pub mod time_serde;
pub mod updates;

pub mod result_sink;
pub mod session_store;
pub mod snapshot_interface;

//! Embassy async tasks

pub mod flash_id;

pub use flash_id::flash_id_task;

pub mod process;
pub mod status;

//! Concrete storage backends. `file` is the only one this workspace ships.

pub mod file;

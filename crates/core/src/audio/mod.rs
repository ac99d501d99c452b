//! Audio file handling.

pub mod io;

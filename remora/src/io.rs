//! Writing of optional run artifacts.

pub mod side_files;

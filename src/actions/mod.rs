//! Actions on duplicate target files.
//!
//! ```no_run
//! use arcdupe::actions::{delete_files, DeleteMode};
//! use std::path::PathBuf;
//!
//! let result = delete_files(&[PathBuf::from("/tmp/dup.bin")], DeleteMode::Trash, true);
//! println!("{}", result.summary());
//! ```

pub mod delete;

pub use delete::{
    delete_file, delete_files, BatchDeleteResult, DeleteError, DeleteMode, DeleteResult,
};

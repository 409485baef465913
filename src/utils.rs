//! # Utility Functions Module
//!
//! Small helpers shared by the command builder and the converter:
//! argument vectors, lossy path rendering and output naming.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Converts any iterable of string-like items into owned argument strings.
///
/// ```ignore
/// let args = to_string_vec(["-b:a", "128k"]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Builds a `Vec<String>` of process arguments without `.to_string()` noise.
///
/// ```ignore
/// let args = args!["-y", "-i", path_arg(src)];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        {
            let args: ::std::vec::Vec<::std::string::String> =
                ::std::vec![$(::std::string::ToString::to_string(&$item)),*];
            args
        }
    };
}

/// Render a path as a process argument (lossy on non UTF-8 names)
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Default output path for an input: same directory, `<stem><suffix>.mp4`
pub fn suggest_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().unwrap_or_else(|| OsStr::new("output"));
    let mut name = stem.to_os_string();
    name.push(suffix);
    name.push(".mp4");
    input.with_file_name(name)
}

/// Size in mebibytes with two decimals, e.g. `12.34 MB`
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

//! # Tool Path Resolver
//!
//! Finds the external binaries (`ffmpeg`, `ffprobe`) in this order:
//! - explicit path from the configuration
//! - the process search path (`PATH`)
//! - the bundle fallback: a tools directory next to the application
//!
//! A missing tool is a normal outcome (`None`), never a panic.

use crate::config::Config;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// Environment variable that points at a directory of bundled tools
pub const TOOLS_DIR_ENV: &str = "WABA_TOOLS_DIR";

/// Tool path resolver for system and bundled installs
#[derive(Debug, Clone, Default)]
pub struct ToolPathResolver {
    /// Fallback directory where tools ship with the application
    tools_dir: Option<PathBuf>,
    ffmpeg_override: Option<PathBuf>,
    ffprobe_override: Option<PathBuf>,
    /// Replaces `PATH` for the system lookup when set
    search_path: Option<OsString>,
}

impl ToolPathResolver {
    /// Resolver honouring the overrides in `config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            tools_dir: config
                .tools_dir
                .clone()
                .or_else(Self::detect_bundled_tools_dir),
            ffmpeg_override: config.ffmpeg_path.clone(),
            ffprobe_override: config.ffprobe_path.clone(),
            search_path: None,
        }
    }

    /// Use `dir` as the bundle fallback location
    pub fn with_tools_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tools_dir = Some(dir.into());
        self
    }

    /// Search `paths` (same syntax as `PATH`) instead of the process `PATH`
    pub fn with_search_path(mut self, paths: impl Into<OsString>) -> Self {
        self.search_path = Some(paths.into());
        self
    }

    /// Bundle location: `WABA_TOOLS_DIR`, else the directory of the executable
    fn detect_bundled_tools_dir() -> Option<PathBuf> {
        if let Some(dir) = env::var_os(TOOLS_DIR_ENV) {
            let dir = PathBuf::from(dir);
            debug!("Using tools directory from {}: {:?}", TOOLS_DIR_ENV, dir);
            return Some(dir);
        }

        let exe_dir = env::current_exe().ok()?.parent()?.to_path_buf();
        debug!("Using executable directory as tools directory: {:?}", exe_dir);
        Some(exe_dir)
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        debug!("Resolving tool: {}", tool_name);

        if let Some(path) = self.override_for(tool_name) {
            if path.is_file() {
                debug!("Using configured path: {} -> {:?}", tool_name, path);
                return Some(path.to_path_buf());
            }
            warn!("Configured path for {} does not exist: {:?}", tool_name, path);
        }

        if let Some(path) = self.find_in_system_path(tool_name) {
            debug!("Using system tool: {} -> {:?}", tool_name, path);
            return Some(path);
        }

        if let Some(ref tools_dir) = self.tools_dir {
            let bundled = Self::bundled_tool_path(tools_dir, tool_name);
            if bundled.exists() {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled);
                return Some(bundled);
            }
            debug!("Bundled path does not exist: {:?}", bundled);
        }

        warn!("Tool not found: {}", tool_name);
        None
    }

    fn override_for(&self, tool_name: &str) -> Option<&Path> {
        match tool_name {
            FFMPEG => self.ffmpeg_override.as_deref(),
            FFPROBE => self.ffprobe_override.as_deref(),
            _ => None,
        }
    }

    fn bundled_tool_path(tools_dir: &Path, tool_name: &str) -> PathBuf {
        let extension = if cfg!(windows) { ".exe" } else { "" };
        tools_dir.join(format!("{}{}", tool_name, extension))
    }

    fn find_in_system_path(&self, tool_name: &str) -> Option<PathBuf> {
        match &self.search_path {
            Some(paths) => {
                let cwd = env::current_dir().ok()?;
                which::which_in(tool_name, Some(paths), cwd).ok()
            }
            None => which::which(tool_name).ok(),
        }
    }

    pub fn ffmpeg(&self) -> Option<PathBuf> {
        self.resolve_tool(FFMPEG)
    }

    pub fn ffprobe(&self) -> Option<PathBuf> {
        self.resolve_tool(FFPROBE)
    }

    /// Install hints for a missing tool, one line each
    pub fn install_instructions() -> [&'static str; 3] {
        [
            "- Windows: https://www.gyan.dev/ffmpeg/builds/ (add bin folder to PATH)",
            "- macOS: brew install ffmpeg",
            "- Linux: sudo apt install ffmpeg or your distro equivalent",
        ]
    }

    /// Get a report of tool availability
    pub fn get_tools_report(&self) -> String {
        let mut report = String::from("Tool availability:\n");
        report.push_str(&format!("Bundled tools dir: {:?}\n", self.tools_dir));

        for tool in [FFMPEG, FFPROBE] {
            match self.resolve_tool(tool) {
                Some(path) => report.push_str(&format!("  ✅ {} -> {}\n", tool, path.display())),
                None => report.push_str(&format!("  ❌ {} (not found)\n", tool)),
            }
        }

        if self.ffmpeg().is_none() {
            report.push_str("\nInstall ffmpeg (ffprobe ships with it):\n");
            for line in Self::install_instructions() {
                report.push_str(line);
                report.push('\n');
            }
        }

        report
    }
}

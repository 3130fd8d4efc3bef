use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use which::which;

/// Launch configuration for [`crate::ChromiumDriver`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CdpConfig {
    /// Empty path means "let chromiumoxide find one".
    pub executable: PathBuf,
    /// Persistent profile; reusing it keeps an authenticated session between runs.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub request_timeout_ms: u64,
    pub launch_timeout_ms: u64,
    pub window_size: (u32, u32),
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: None,
            headless: true,
            request_timeout_ms: 30_000,
            launch_timeout_ms: 20_000,
            window_size: (1440, 900),
        }
    }
}

impl CdpConfig {
    pub fn with_executable(mut self, executable: Option<PathBuf>) -> Self {
        if let Some(path) = executable {
            self.executable = path;
        }
        self
    }

    pub fn with_user_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_data_dir = dir;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

fn detect_chrome_executable() -> Option<PathBuf> {
    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/snap/bin/chromium"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "freebsd")))]
    {
        Vec::new()
    }
}

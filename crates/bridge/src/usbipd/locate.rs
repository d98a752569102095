//! Sharing tool executable resolution

use std::path::{Path, PathBuf};

const EXE_NAMES: &[&str] = &["usbipd.exe", "usbipd"];
const INSTALL_DIR: &str = "usbipd-win";

/// Resolve the sharing tool executable
///
/// Order: the explicit location (an existing file, or a folder holding the
/// tool), the folder of the running executable, the usbipd-win install
/// folders, and finally plain `usbipd` looked up through `PATH` at spawn time.
pub fn resolve_tool_path(explicit: Option<&Path>) -> PathBuf {
    let env = |key: &str| std::env::var_os(key).map(PathBuf::from);
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));

    let install_roots: Vec<PathBuf> = [
        env("ProgramFiles"),
        env("ProgramFiles(x86)"),
        dirs::data_local_dir().map(|d| d.join("Programs")),
    ]
    .into_iter()
    .flatten()
    .collect();

    resolve_with(explicit, exe_dir.as_deref(), &install_roots)
}

/// Resolution against explicit search roots
pub fn resolve_with(
    explicit: Option<&Path>,
    exe_dir: Option<&Path>,
    install_roots: &[PathBuf],
) -> PathBuf {
    // A missing explicit location falls through to the search below
    if let Some(path) = explicit {
        if path.is_file() {
            return path.to_path_buf();
        }
        if let Some(found) = find_in(path) {
            return found;
        }
    }

    if let Some(found) = exe_dir.and_then(find_in) {
        return found;
    }

    install_roots
        .iter()
        .map(|root| root.join(INSTALL_DIR).join("usbipd.exe"))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from("usbipd"))
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    EXE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

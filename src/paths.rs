use std::env;
use std::fs;
use std::path::PathBuf;

const DATA_DIR_ENV: &str = "ACTIVITY_TRACKER_DATA_DIR";

/// Resolves the store directory: explicit flag, then environment, then the
/// platform data directory.
pub fn resolve_data_dir(cli_dir: Option<PathBuf>) -> PathBuf {
	if let Some(dir) = cli_dir {
		return absolutize(dir);
	}

	if let Some(dir) = env::var_os(DATA_DIR_ENV) {
		let dir = PathBuf::from(dir);
		if !dir.as_os_str().is_empty() {
			return absolutize(dir);
		}
	}

	default_data_dir()
}

fn default_data_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(dir) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(dir).join("activity_tracker");
		}
	}

	if let Some(dir) = env::var_os("XDG_DATA_HOME") {
		return PathBuf::from(dir).join("activity_tracker");
	}

	if let Some(dir) = env::var_os("HOME") {
		return PathBuf::from(dir)
			.join(".local")
			.join("share")
			.join("activity_tracker");
	}

	PathBuf::from(".activity_tracker")
}

fn absolutize(dir: PathBuf) -> PathBuf {
	let dir = if dir.is_absolute() {
		dir
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(dir)
	} else {
		dir
	};

	if dir.exists() {
		fs::canonicalize(&dir).unwrap_or(dir)
	} else {
		dir
	}
}

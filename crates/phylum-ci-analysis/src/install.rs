//! Download and install of the `phylum` CLI from its GitHub releases.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use phylum_ci_core::PhylumCiError;
use tracing::{debug, info};

const RELEASES_URL: &str = "https://github.com/phylum-dev/cli/releases";

/// Release target triple for the running platform, `None` when the CLI is
/// not published for it.
pub fn release_target() -> Option<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => Some("x86_64-unknown-linux-musl"),
        ("linux", "aarch64") => Some("aarch64-unknown-linux-musl"),
        ("macos", "x86_64") => Some("x86_64-apple-darwin"),
        ("macos", "aarch64") => Some("aarch64-apple-darwin"),
        _ => None,
    }
}

/// Archive URL for `release` (`latest` or a tag such as `v7.1.0`).
///
/// # Examples
///
/// ```
/// use phylum_ci_analysis::install::download_url;
///
/// assert_eq!(
///     download_url("7.1.0", "x86_64-unknown-linux-musl"),
///     "https://github.com/phylum-dev/cli/releases/download/v7.1.0/phylum-x86_64-unknown-linux-musl.zip"
/// );
/// ```
pub fn download_url(release: &str, target: &str) -> String {
    if release.eq_ignore_ascii_case("latest") {
        return format!("{RELEASES_URL}/latest/download/phylum-{target}.zip");
    }
    let tag = if release.starts_with('v') {
        release.to_string()
    } else {
        format!("v{release}")
    };
    format!("{RELEASES_URL}/download/{tag}/phylum-{target}.zip")
}

/// Download `release` and run its bundled installer.
///
/// Returns the path the installer places the executable at,
/// `~/.local/bin/phylum`.
///
/// # Errors
///
/// Returns [`PhylumCiError::PhylumCli`] if the platform is unsupported, the
/// download fails, or the installer exits non-zero.
pub async fn install(release: &str) -> Result<PathBuf, PhylumCiError> {
    let target = release_target().ok_or_else(|| {
        PhylumCiError::PhylumCli(format!(
            "no phylum CLI release for {}-{}",
            std::env::consts::ARCH,
            std::env::consts::OS
        ))
    })?;
    let url = download_url(release, target);
    info!(url = url.as_str(), "downloading phylum CLI");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .map_err(|e| PhylumCiError::PhylumCli(format!("failed to create HTTP client: {e}")))?;
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| PhylumCiError::PhylumCli(format!("failed to download {url}: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(PhylumCiError::PhylumCli(format!(
            "failed to download {url}: HTTP {status}"
        )));
    }
    let archive = response
        .bytes()
        .await
        .map_err(|e| PhylumCiError::PhylumCli(format!("failed to read {url}: {e}")))?;

    let staging = tempfile::tempdir()?;
    extract(&archive, staging.path())?;
    let script = find_install_script(staging.path())?;
    let script_dir = script.parent().unwrap_or(staging.path());

    debug!(script = %script.display(), "running phylum installer");
    let output = tokio::process::Command::new("sh")
        .arg(&script)
        .arg("-y")
        .current_dir(script_dir)
        .output()
        .await
        .map_err(|e| PhylumCiError::PhylumCli(format!("failed to run installer: {e}")))?;
    if !output.status.success() {
        return Err(PhylumCiError::PhylumCli(format!(
            "phylum installer failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let home = home_dir().ok_or_else(|| {
        PhylumCiError::PhylumCli("cannot determine home directory for installed CLI".into())
    })?;
    let bin = home.join(".local").join("bin").join("phylum");
    info!(bin = %bin.display(), "installed phylum CLI");
    Ok(bin)
}

/// Unpack a release archive into `dest`.
///
/// # Errors
///
/// Returns [`PhylumCiError::PhylumCli`] for a corrupt archive.
pub fn extract(archive: &[u8], dest: &Path) -> Result<(), PhylumCiError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| PhylumCiError::PhylumCli(format!("invalid release archive: {e}")))?;
    zip.extract(dest)
        .map_err(|e| PhylumCiError::PhylumCli(format!("failed to unpack release archive: {e}")))
}

/// Locate `install.sh` at the top of `dir` or one level below.
///
/// # Errors
///
/// Returns [`PhylumCiError::PhylumCli`] if no installer is present.
pub fn find_install_script(dir: &Path) -> Result<PathBuf, PhylumCiError> {
    let direct = dir.join("install.sh");
    if direct.is_file() {
        return Ok(direct);
    }
    for entry in std::fs::read_dir(dir)? {
        let candidate = entry?.path().join("install.sh");
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(PhylumCiError::PhylumCli(
        "release archive does not contain install.sh".into(),
    ))
}

/// The user's home directory, from `HOME` or `USERPROFILE`.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn home_dir_prefers_home_variable() {
        let expected = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from);
        assert_eq!(home_dir(), expected);
    }

    #[test]
    fn latest_release_url() {
        assert_eq!(
            download_url("latest", "aarch64-apple-darwin"),
            "https://github.com/phylum-dev/cli/releases/latest/download/phylum-aarch64-apple-darwin.zip"
        );
        assert_eq!(
            download_url("v6.0.0", "x"),
            "https://github.com/phylum-dev/cli/releases/download/v6.0.0/phylum-x.zip"
        );
    }

    #[test]
    fn extracts_and_finds_nested_installer() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = archive(&[
            ("phylum-x86_64-unknown-linux-musl/install.sh", "#!/bin/sh\n"),
            ("phylum-x86_64-unknown-linux-musl/phylum", "binary"),
        ]);
        extract(&bytes, dir.path()).unwrap();
        let script = find_install_script(dir.path()).unwrap();
        assert!(script.ends_with("phylum-x86_64-unknown-linux-musl/install.sh"));
    }

    #[test]
    fn archive_without_installer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        extract(&archive(&[("README.md", "hi")]), dir.path()).unwrap();
        assert!(matches!(
            find_install_script(dir.path()),
            Err(PhylumCiError::PhylumCli(_))
        ));
    }

    #[test]
    fn corrupt_archive_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract(b"not a zip", dir.path()).is_err());
    }
}

//! Collaborators that run on the publishing host itself.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::warn;

use super::error::CollaboratorError;

static SRC_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']+)["']"#).expect("invalid src pattern")
});

static LINK_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#).expect("invalid link pattern")
});

/// Unpack a tar archive into `dest`, creating it if needed.
pub async fn unpack_archive(archive: &Path, dest: &Path) -> Result<(), CollaboratorError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), CollaboratorError> {
        std::fs::create_dir_all(&dest)?;
        let file = std::fs::File::open(&archive)?;
        tar::Archive::new(file).unpack(&dest)?;
        Ok(())
    })
    .await
    .map_err(|e| CollaboratorError::fault(format!("archive extraction aborted: {e}")))?
}

/// Copy the tree under `from` into `to`, replacing files that already exist.
///
/// Symbolic links are skipped; only regular files and directories are
/// published.
pub async fn copy_tree(from: &Path, to: &Path) -> Result<(), CollaboratorError> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        tokio::fs::create_dir_all(&dst).await?;
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = dst.join(entry.file_name());
            let file_type = entry.file_type().await?;
            if file_type.is_symlink() {
                warn!(path = %entry.path().display(), "skipping symbolic link");
            } else if file_type.is_dir() {
                pending.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), &target).await?;
            }
        }
    }
    Ok(())
}

/// Fill `{shortname}` and `{version}` in each argument of the command template.
pub fn render_command(template: &[String], shortname: &str, version: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace("{shortname}", shortname)
                .replace("{version}", version)
        })
        .collect()
}

/// Run the shortlink update command; a non-zero exit is a fault.
pub async fn run_shortlink_command(
    template: &[String],
    shortname: &str,
    version: &str,
) -> Result<(), CollaboratorError> {
    let argv = render_command(template, shortname, version);
    let Some((program, args)) = argv.split_first() else {
        return Err(CollaboratorError::fault(
            "shortlink command is not configured",
        ));
    };

    let output = Command::new(program).args(args).output().await?;
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(CollaboratorError::fault(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}

/// Absolute resource URLs in `html` whose host is not in `allowed_hosts`.
///
/// Looks at `src` attributes and `<link href>`. Relative references stay
/// on the publishing host and are never reported. Order of first
/// appearance is kept and duplicates are dropped.
pub fn find_third_party_resources(html: &str, allowed_hosts: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    SRC_ATTR
        .captures_iter(html)
        .chain(LINK_HREF.captures_iter(html))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|url| match host_of(url) {
            Some(host) => !allowed_hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)),
            None => false,
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn host_of(url: &str) -> Option<&str> {
    let rest = strip_prefix_ignore_case(url, "https://")
        .or_else(|| strip_prefix_ignore_case(url, "http://"))
        .or_else(|| url.strip_prefix("//"))?;
    let end = rest.find(['/', ':', '?', '#']).unwrap_or(rest.len());
    let host = &rest[..end];
    (!host.is_empty()).then_some(host)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

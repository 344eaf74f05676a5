use anyhow::{Context, Result};
use log::debug;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// The last persisted follower/friend lists for one tracked account.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub followers: Vec<String>,
    pub friends: Vec<String>,
}

/// Read the snapshot for an account.  A file that does not exist yet is not
/// an error: it yields an empty snapshot, which is how a first-ever run is
/// recognized downstream.
pub fn load(path: &Path) -> Result<Snapshot> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("'{}' does not exist", path.display());
            return Ok(Snapshot::default());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("unable to open file '{}'", path.display()))
        }
    };

    // One record per line; when a label repeats, the last line wins.
    let record = Regex::new(r"^(?P<label>[^:]+):\s*(?P<names>.*)$").unwrap();
    let mut snapshot = Snapshot::default();
    for line in contents.lines() {
        if let Some(caps) = record.captures(line.trim()) {
            let names = split_names(&caps["names"]);
            match &caps["label"] {
                "followers" => snapshot.followers = names,
                "friends" => snapshot.friends = names,
                _ => (),
            }
        }
    }

    debug!(
        "loaded {} followers and {} friends from '{}'",
        snapshot.followers.len(),
        snapshot.friends.len(),
        path.display()
    );
    Ok(snapshot)
}

/// Overwrite the snapshot file wholesale.  The new contents go to a sibling
/// temp file first and are renamed into place, so a failed write leaves the
/// previous snapshot intact.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("unable to create directory '{}'", dir.display()))?;
    }

    let contents = format!(
        "{}\n{}\n",
        record_line("followers", &snapshot.followers),
        record_line("friends", &snapshot.friends)
    );

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)
        .with_context(|| format!("unable to write to '{}'", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("unable to replace '{}'", path.display()))?;

    debug!(
        "wrote {} followers and {} friends to '{}'",
        snapshot.followers.len(),
        snapshot.friends.len(),
        path.display()
    );
    Ok(())
}

fn split_names(names: &str) -> Vec<String> {
    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

fn record_line(label: &str, names: &[String]) -> String {
    if names.is_empty() {
        format!("{label}:")
    } else {
        format!("{label}: {}", names.join(","))
    }
}

//! `Bootstrap.txt` persistence — newline-separated multiaddrs.
//!
//! Grounded on `Utils.go`'s `readBootstrapPeers` / `addPeerToBootstrap`.

use std::path::Path;

use crate::error::DfsResult;

/// Read the bootstrap peer multiaddrs from disk. Returns an empty list if
/// the file doesn't exist yet.
pub fn read(path: &Path) -> DfsResult<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Ensure the file exists (created empty if missing).
pub fn ensure_exists(path: &Path) -> DfsResult<()> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, "")?;
    }
    Ok(())
}

/// Append this node's own listen multiaddr to the bootstrap file, skipping
/// the write if it's already present.
pub fn append_self(path: &Path, own_addr: &str) -> DfsResult<()> {
    let existing = read(path)?;
    if existing.iter().any(|a| a == own_addr) {
        return Ok(());
    }
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{own_addr}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Bootstrap.txt");
        ensure_exists(&path).unwrap();

        append_self(&path, "/ip4/127.0.0.1/tcp/11111/p2p/12D3KooWExample").unwrap();
        append_self(&path, "/ip4/127.0.0.1/tcp/11111/p2p/12D3KooWExample").unwrap();

        let peers = read(&path).unwrap();
        assert_eq!(peers.len(), 1);
    }
}

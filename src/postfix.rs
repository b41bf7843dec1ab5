//! Postfix collaborator: detect a live deployment and reload the transport
//! map after an export. The export format itself lives in `export`.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::info;

pub const TRANSPORT_MAP_PATH: &str = "/etc/postfix/transport_banned";

/// A live deployment is one where the transport map already exists.
pub fn is_deployment_live() -> bool {
    Path::new(TRANSPORT_MAP_PATH).exists()
}

/// Where the blocklist goes: the live map on a Postfix host, a local file
/// otherwise.
pub fn blocklist_path() -> PathBuf {
    if is_deployment_live() {
        PathBuf::from(TRANSPORT_MAP_PATH)
    } else {
        PathBuf::from("transport_banned")
    }
}

/// Compiles the transport map and reloads Postfix so it picks it up.
pub fn reload_transport_map() -> io::Result<()> {
    info!("Running postmap.");
    run("/usr/sbin/postmap", &[TRANSPORT_MAP_PATH])?;

    info!("Reloading postfix so it picks up the new transport map.");
    run("/usr/sbin/service", &["postfix", "reload"])?;

    Ok(())
}

fn run(program: &str, args: &[&str]) -> io::Result<()> {
    let status = Command::new(program).args(args).status()?;
    if !status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{program} exited with {status}"),
        ));
    }
    Ok(())
}

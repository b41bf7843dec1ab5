//! Renders the ban list into a Postfix transport-map blocklist file.

use std::path::Path;

use log::info;
use thiserror::Error;
use tokio::fs;

use crate::domain::BanRecord;
use crate::store::{BanStore, StoreError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not write blocklist: {0}")]
    Io(#[from] std::io::Error),
}

pub struct TransportExporter<'a> {
    bans: &'a dyn BanStore,
}

impl<'a> TransportExporter<'a> {
    pub fn new(bans: &'a dyn BanStore) -> Self {
        TransportExporter { bans }
    }

    /// Reads every ban record and rewrites the blocklist file in full.
    /// The write goes through a sibling temp file and a rename so the MTA
    /// never sees a half-written map.
    pub async fn export(&self, path: &Path) -> Result<(), ExportError> {
        let bans = self.bans.all().await?;
        let rendered = render(&bans);

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, rendered).await?;
        fs::rename(&tmp, path).await?;

        info!("Wrote {} banned address(es) to {}", bans.len(), path.display());
        Ok(())
    }
}

fn render(bans: &[BanRecord]) -> String {
    bans.iter()
        .map(|ban| {
            format!(
                "{} discard:BANNED {} at {}",
                ban.email,
                ban.reason,
                ban.timestamp.format("%Y-%m-%d %H:%M:%S")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

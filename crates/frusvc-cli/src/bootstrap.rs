//! Startup discovery documents.
//!
//! Each configured entry is read from disk and attached through the same
//! `addFRU` path a remote producer uses. A document that cannot be read or
//! attached is logged and skipped; the daemon still starts.

use std::fs;
use std::path::Path;

use frusvc_service::{Call, Dispatcher};
use tracing::{info, warn};

use crate::config::BootstrapEntry;

/// Attach every entry in order. Returns how many were attached.
pub fn attach_all(dispatcher: &Dispatcher, entries: &[BootstrapEntry], base_dir: &Path) -> usize {
    let mut attached = 0;
    for entry in entries {
        let file = base_dir.join(&entry.file);
        let description = match fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "bootstrap document unreadable, skipped");
                continue;
            }
        };

        let call = Call::AddFru {
            parent_path: entry.parent_path.clone(),
            description,
        };
        match dispatcher.dispatch(&call) {
            Ok(_) => {
                info!(file = %file.display(), parent = %entry.parent_path, "bootstrap document attached");
                attached += 1;
            }
            Err(e) => {
                warn!(file = %file.display(), parent = %entry.parent_path, error = %e, "bootstrap document rejected, skipped");
            }
        }
    }
    attached
}

//! Packaging built feeds into signed `.su3` files.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{FeedError, Result};
use crate::su3::keys::Su3Signer;
use crate::su3::Su3File;

pub const ATOM_SUFFIX: &str = ".atom.xml";
pub const SU3_SUFFIX: &str = ".su3";

/// `news_de.atom.xml` → `news_de.su3`. `None` for anything else.
pub fn su3_path_for(atom: &Path) -> Option<PathBuf> {
    let name = atom.file_name()?.to_str()?;
    let stem = name.strip_suffix(ATOM_SUFFIX)?;
    Some(atom.with_file_name(format!("{stem}{SU3_SUFFIX}")))
}

/// Wrap one Atom file in a signed SU3 envelope written next to it.
///
/// `version` is the envelope version string; the signing driver passes the
/// current UNIX time.
pub fn sign_feed(atom: &Path, signer: &dyn Su3Signer, signer_id: &str, version: &str) -> Result<PathBuf> {
    let output = su3_path_for(atom).ok_or_else(|| FeedError::NotAtomFile(atom.to_path_buf()))?;
    let signature_type = signer.signature_type()?;
    let content = fs::read(atom).map_err(|e| FeedError::read("reading feed", atom, e))?;

    let envelope = Su3File::news(
        signature_type,
        version.to_string(),
        signer_id.to_string(),
        content,
    );
    let bytes = envelope.to_bytes(signer)?;
    fs::write(&output, &bytes).map_err(|e| FeedError::write("writing su3", &output, e))?;

    info!(
        path = %output.display(),
        signature_type = %signature_type,
        bytes = bytes.len(),
        sha256 = %hex::encode(Sha256::digest(&bytes)),
        "signed feed"
    );
    Ok(output)
}

#[derive(Debug, Default)]
pub struct SignReport {
    pub signed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, FeedError)>,
}

impl SignReport {
    /// True when there was something to sign and none of it succeeded.
    pub fn all_failed(&self) -> bool {
        self.signed.is_empty() && !self.failed.is_empty()
    }
}

/// Sign every `.atom.xml` under `build_dir`. Failures are recorded per file
/// and never stop the walk.
pub fn sign_build_dir(build_dir: &Path, signer: &dyn Su3Signer, signer_id: &str) -> SignReport {
    let version = OffsetDateTime::now_utc().unix_timestamp().to_string();
    let mut report = SignReport::default();

    let mut candidates: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(build_dir).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                let is_feed = entry.file_type().is_file()
                    && entry.file_name().to_string_lossy().ends_with(ATOM_SUFFIX);
                if is_feed {
                    candidates.push(entry.into_path());
                }
            }
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| build_dir.to_path_buf());
                warn!(path = %path.display(), error = %err, "skipping unreadable path");
                let io = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                report.failed.push((path.clone(), FeedError::read("walking build directory", path, io)));
            }
        }
    }

    for atom in candidates {
        match sign_feed(&atom, signer, signer_id, &version) {
            Ok(output) => report.signed.push(output),
            Err(err) => {
                warn!(path = %atom.display(), error = %err, "signing failed");
                report.failed.push((atom, err));
            }
        }
    }

    info!(
        dir = %build_dir.display(),
        signed = report.signed.len(),
        failed = report.failed.len(),
        "signing finished"
    );
    report
}

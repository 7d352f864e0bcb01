//! Fingerprints the stylesheet.
//!
//! `static/css/main.css` is copied to `static/css/derived/main.<hash>.css`
//! and the hash is exported as `CSS_HASH` for the `css_hash` template filter,
//! so the stylesheet URL changes whenever its content does.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Hex digits of the SHA-256 kept in the file name.
const HASH_LEN: usize = 8;

fn main() {
    let manifest_dir = PathBuf::from(
        std::env::var_os("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by Cargo"),
    );
    let css_dir = manifest_dir.join("static/css");
    let source = css_dir.join("main.css");
    println!("cargo:rerun-if-changed={}", source.display());

    let Ok(content) = fs::read(&source) else {
        println!("cargo:warning=static/css/main.css not found; stylesheet is not fingerprinted");
        println!("cargo:rustc-env=CSS_HASH=");
        return;
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let hash = digest.get(..HASH_LEN).unwrap_or(&digest);
    println!("cargo:rustc-env=CSS_HASH={hash}");

    let derived = css_dir.join("derived");
    fs::create_dir_all(&derived).expect("create static/css/derived");
    prune_stale(&derived, hash);
    fs::write(derived.join(format!("main.{hash}.css")), &content)
        .expect("write fingerprinted stylesheet");
}

/// Remove fingerprinted copies left over from earlier builds.
fn prune_stale(derived: &Path, current: &str) {
    let keep = format!("main.{current}.css");
    let Ok(entries) = fs::read_dir(derived) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("main.") && name.ends_with(".css") && name != keep {
            let _ = fs::remove_file(entry.path());
        }
    }
}

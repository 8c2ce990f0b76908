use std::path::Path;
use std::path::PathBuf;

/// Deterministic per-project socket path.
///
/// Derived from the canonicalized project directory so every forwarder
/// spawned inside the project finds the same server, while two projects
/// never collide. Lives under the user runtime dir when available, `/tmp`
/// otherwise.
pub fn socket_path_for(project_dir: &Path) -> PathBuf {
    let canonical = project_dir
        .canonicalize()
        .unwrap_or_else(|_| project_dir.to_path_buf());
    let digest = fnv1a(canonical.to_string_lossy().as_bytes());
    let base = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
    base.join(format!("toolgate-{digest:016x}.sock"))
}

/// FNV-1a, enough to fingerprint a path; this is a filename, not a security
/// boundary.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

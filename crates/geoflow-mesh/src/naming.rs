//! Field file names of the form `root.NNNNNN.ext`.
//!
//! Roots are matched against a known list instead of split out of the name,
//! so a root containing dots (`u1.s`) still parses.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::{MeshError, Result};

/// Extension written by the solver.
pub const FIELD_EXTENSION: &str = "out";

/// Width of the zero-padded timestep component.
pub const TIMESTEP_WIDTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldFileName {
    pub root: String,
    pub timestep: u64,
    pub extension: String,
}

impl FieldFileName {
    pub fn new(root: impl Into<String>, timestep: u64) -> Self {
        Self {
            root: root.into(),
            timestep,
            extension: FIELD_EXTENSION.to_string(),
        }
    }

    /// Parse `name` against the known `roots`. The longest matching root
    /// wins, so `u1` and `u1.s` can coexist.
    pub fn parse<S: AsRef<str>>(name: &str, roots: &[S]) -> Option<Self> {
        let root = roots
            .iter()
            .map(AsRef::as_ref)
            .filter(|r| {
                !r.is_empty()
                    && name.len() > r.len()
                    && name.starts_with(r)
                    && name.as_bytes()[r.len()] == b'.'
            })
            .max_by_key(|r| r.len())?;

        let rest = &name[root.len() + 1..];
        let (digits, extension) = rest.split_once('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || extension.is_empty()
        {
            return None;
        }

        Some(Self {
            root: root.to_string(),
            timestep: digits.parse().ok()?,
            extension: extension.to_string(),
        })
    }

    /// Name with the timestep component stripped, `root.ext`.
    pub fn stem(&self) -> String {
        format!("{}.{}", self.root, self.extension)
    }
}

impl fmt::Display for FieldFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}.{}",
            self.root,
            self.timestep,
            self.extension,
            width = TIMESTEP_WIDTH
        )
    }
}

/// Every timestep for which at least one of `roots` has a file directly
/// inside `dir`, ascending.
pub fn discover_timesteps<S: AsRef<str>>(dir: &Path, roots: &[S]) -> Result<Vec<u64>> {
    let mut found = BTreeSet::new();

    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory walk failed"));
            MeshError::io(path, source)
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(parsed) = FieldFileName::parse(name, roots) {
            if parsed.extension == FIELD_EXTENSION {
                found.insert(parsed.timestep);
            }
        }
    }

    debug!(dir = %dir.display(), timesteps = found.len(), "Discovered field timesteps");
    Ok(found.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_format() {
        assert_eq!(FieldFileName::new("T", 42).to_string(), "T.000042.out");
        assert_eq!(FieldFileName::new("T", 1234567).to_string(), "T.1234567.out");
    }

    #[test]
    fn test_parse_known_root() {
        let parsed = FieldFileName::parse("u1.000010.out", &["u1", "T"]).unwrap();
        assert_eq!(parsed, FieldFileName::new("u1", 10));
        assert_eq!(parsed.stem(), "u1.out");
    }

    #[test]
    fn test_parse_root_with_dots() {
        let roots = ["u1", "u1.s"];
        let parsed = FieldFileName::parse("u1.s.000003.out", &roots).unwrap();
        assert_eq!(parsed.root, "u1.s");
        assert_eq!(parsed.timestep, 3);
    }

    #[test]
    fn test_parse_rejects_unknown_or_malformed() {
        let roots = ["T"];
        assert!(FieldFileName::parse("rho.000001.out", &roots).is_none());
        assert!(FieldFileName::parse("T.out", &roots).is_none());
        assert!(FieldFileName::parse("T.00a001.out", &roots).is_none());
        assert!(FieldFileName::parse("T.000001.", &roots).is_none());
        assert!(FieldFileName::parse("TT.000001.out", &roots).is_none());
    }

    #[test]
    fn test_discover_timesteps() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "T.000000.out",
            "T.000020.out",
            "u1.000010.out",
            "xgrid.000000.out",
            "T.000030.log",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("T.000040.out")).unwrap();

        let steps = discover_timesteps(dir.path(), &["T", "u1"]).unwrap();
        assert_eq!(steps, vec![0, 10, 20]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let err = discover_timesteps(Path::new("/nonexistent/geoflow"), &["T"]).unwrap_err();
        assert!(matches!(err, MeshError::Io { .. }));
    }
}

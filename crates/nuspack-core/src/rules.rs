//! Content rule table and resolution against the input tree.
//!
//! [`common_rules`] is a pure, deterministic function of the title's
//! `(group id, parent id)` pair; [`resolve_contents`] is the single I/O
//! step that binds rules to actual files and assigns content indices.

use std::path::Path;

use glob::Pattern;
use nuspack_schema::ContentFlags;
use tracing::debug;
use walkdir::WalkDir;

use crate::content::ContentDescriptor;
use crate::error::PackError;

/// One entry of the content rule table: a path pattern plus the flags any
/// matching content receives.
#[derive(Debug, Clone)]
pub struct ContentRule {
    /// Glob over the `/`-separated path relative to the input root.
    pub pattern: Pattern,
    /// Flags applied to matching contents.
    pub flags: ContentFlags,
    /// A mandatory rule with no matching source file aborts the build.
    pub mandatory: bool,
}

impl ContentRule {
    fn new(pattern: &str, flags: ContentFlags, mandatory: bool) -> Self {
        Self {
            // The pattern literals below are all valid globs.
            pattern: Pattern::new(pattern).expect("invalid builtin rule pattern"),
            flags,
            mandatory,
        }
    }
}

/// The common rule table for one title.
///
/// Ordering policy (fixed; indices feed IV derivation and must match the
/// content roles the platform expects):
///
/// 1. `code/*.rpx` - the executable; its first match is always index 0.
/// 2. `code/*.rpl` - code libraries.
/// 3. `code/*.xml` - code descriptors (app.xml, cos.xml).
/// 4. `meta/meta.xml` - the title manifest.
/// 5. `meta/*.jpg`, `meta/*.tga` - preview images, skippable on install.
/// 6. `content/*` - content-group assets.
///
/// The group and parent ids select this common table; they are recorded
/// against the build in logs but the table itself does not branch on them
/// today.
pub fn common_rules(group_id: u16, parent_id: u64) -> Vec<ContentRule> {
    debug!("building common content rules for group {group_id:04X}, parent {parent_id:016X}");
    let enc = ContentFlags::ENCRYPTED;
    let hashed = ContentFlags::ENCRYPTED | ContentFlags::HASHED;
    let optional = ContentFlags::ENCRYPTED | ContentFlags::OPTIONAL;
    vec![
        ContentRule::new("code/*.rpx", hashed, true),
        ContentRule::new("code/*.rpl", hashed, false),
        ContentRule::new("code/*.xml", enc, false),
        ContentRule::new("meta/meta.xml", enc, false),
        ContentRule::new("meta/*.jpg", optional, false),
        ContentRule::new("meta/*.tga", optional, false),
        ContentRule::new("content/*", hashed, false),
    ]
}

/// Resolve rules against the input tree into dense-indexed descriptors.
///
/// Files are matched in rule order, lexicographically within a rule, and
/// each file is claimed by at most one rule, so re-running on an identical
/// tree yields identical index assignments.
///
/// # Errors
///
/// `PackError::Configuration` when a mandatory rule has no match;
/// `PackError::Io` when the tree cannot be walked.
pub fn resolve_contents(
    input_root: &Path,
    rules: &[ContentRule],
) -> Result<Vec<ContentDescriptor>, PackError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(input_root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            PackError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("walk error without io cause")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(input_root)
            .map_err(|e| PackError::Configuration(e.to_string()))?;
        let rel: String = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((rel, entry.into_path()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut claimed = vec![false; files.len()];
    let mut descriptors: Vec<ContentDescriptor> = Vec::new();

    for rule in rules {
        let mut matched = false;
        for (slot, (rel, abs)) in files.iter().enumerate() {
            if claimed[slot] || !rule.pattern.matches(rel) {
                continue;
            }
            claimed[slot] = true;
            matched = true;
            let index = descriptors.len() as u16;
            debug!(index, path = %rel, flags = %rule.flags, "content resolved");
            descriptors.push(ContentDescriptor {
                index,
                id: u32::from(index),
                flags: rule.flags,
                rel_path: rel.clone(),
                source: abs.clone(),
            });
        }
        if rule.mandatory && !matched {
            return Err(PackError::Configuration(format!(
                "no source file matches mandatory content rule {}",
                rule.pattern.as_str()
            )));
        }
    }

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    fn rules() -> Vec<ContentRule> {
        common_rules(0x1000, 0x0005_0000_1000_0001)
    }

    #[test]
    fn executable_is_index_zero() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "content/asset.bin");
        write(dir.path(), "code/game.rpx");
        write(dir.path(), "code/app.xml");

        let contents = resolve_contents(dir.path(), &rules()).unwrap();
        assert_eq!(contents[0].rel_path, "code/game.rpx");
        assert_eq!(contents[0].index, 0);
        assert!(contents[0].is_hashed());
    }

    #[test]
    fn indices_are_dense_and_increasing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "code/game.rpx");
        write(dir.path(), "code/lib2.rpl");
        write(dir.path(), "code/lib1.rpl");
        write(dir.path(), "code/app.xml");
        write(dir.path(), "meta/meta.xml");
        write(dir.path(), "content/b.bin");
        write(dir.path(), "content/a/nested.bin");

        let contents = resolve_contents(dir.path(), &rules()).unwrap();
        for (i, c) in contents.iter().enumerate() {
            assert_eq!(usize::from(c.index), i);
            assert_eq!(c.id, c.index as u32);
        }
        // Rule order, then lexicographic within a rule.
        let paths: Vec<&str> = contents.iter().map(|c| c.rel_path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "code/game.rpx",
                "code/lib1.rpl",
                "code/lib2.rpl",
                "code/app.xml",
                "meta/meta.xml",
                "content/a/nested.bin",
                "content/b.bin",
            ]
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "code/game.rpx");
        write(dir.path(), "content/x.bin");
        write(dir.path(), "content/y.bin");

        let a = resolve_contents(dir.path(), &rules()).unwrap();
        let b = resolve_contents(dir.path(), &rules()).unwrap();
        let rel = |v: &[ContentDescriptor]| {
            v.iter().map(|c| (c.index, c.rel_path.clone())).collect::<Vec<_>>()
        };
        assert_eq!(rel(&a), rel(&b));
    }

    #[test]
    fn missing_executable_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "content/asset.bin");

        match resolve_contents(dir.path(), &rules()) {
            Err(PackError::Configuration(msg)) => assert!(msg.contains("rpx")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn preview_images_are_optional_flagged() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "code/game.rpx");
        write(dir.path(), "meta/iconTex.tga");

        let contents = resolve_contents(dir.path(), &rules()).unwrap();
        let icon = contents.iter().find(|c| c.rel_path.ends_with(".tga")).unwrap();
        assert!(icon.flags.contains(ContentFlags::OPTIONAL));
        assert!(!icon.is_hashed());
    }
}

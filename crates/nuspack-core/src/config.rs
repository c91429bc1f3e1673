//! Build configuration: title identity and key material for one package.

use std::path::{Path, PathBuf};

use nuspack_schema::Key;

use crate::error::PackError;
use crate::rules::{self, ContentRule};

/// The three subdirectories every decrypted title tree must contain.
pub const INPUT_SUBDIRS: [&str; 3] = ["code", "content", "meta"];

/// Title identity fields, either caller-supplied or recovered from the
/// app.xml descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleIdentity {
    /// 64-bit title id.
    pub title_id: u64,
    /// Title version.
    pub title_version: u16,
    /// Target OS version.
    pub os_version: u64,
    /// Application type flags.
    pub app_type: u32,
}

impl TitleIdentity {
    /// Content group id: bits 8-23 of the title id.
    pub fn group_id(&self) -> u16 {
        (self.title_id >> 8) as u16
    }

    /// Parent title id: the title id with the variant nibble masked out.
    /// Updates and DLC differ from their base title only in that nibble.
    pub fn parent_id(&self) -> u64 {
        self.title_id & !0x0000_000F_0000_0000
    }
}

/// Immutable configuration for one package build, owned by the
/// orchestrator. No process-global state survives between builds.
#[derive(Debug, Clone)]
pub struct PackageConfig {
    /// Root of the decrypted title tree.
    pub input_root: PathBuf,
    /// Title identity.
    pub identity: TitleIdentity,
    /// Caller-supplied title key the content payloads are encrypted
    /// under. The orchestrator can be asked to generate a fresh random
    /// key instead.
    pub encryption_key: Key,
    /// Common key the title key is wrapped under for the ticket.
    pub encrypt_with_key: Key,
    /// Ordered content rule list.
    pub rules: Vec<ContentRule>,
}

impl PackageConfig {
    /// Build a configuration with the common content rules for this
    /// title's group and parent ids.
    pub fn new(
        input_root: impl Into<PathBuf>,
        identity: TitleIdentity,
        encryption_key: Key,
        encrypt_with_key: Key,
    ) -> Self {
        let rules = rules::common_rules(identity.group_id(), identity.parent_id());
        Self {
            input_root: input_root.into(),
            identity,
            encryption_key,
            encrypt_with_key,
            rules,
        }
    }

    /// Check that the input root carries the `code`, `content` and `meta`
    /// subdirectories. Runs before any output or temp directory exists.
    pub fn validate_input_root(&self) -> Result<(), PackError> {
        for sub in INPUT_SUBDIRS {
            if !self.input_root.join(sub).is_dir() {
                return Err(PackError::Configuration(format!(
                    "invalid input dir {}: missing the {sub} folder",
                    self.input_root.display()
                )));
            }
        }
        Ok(())
    }

    /// Absolute path of the app.xml descriptor inside the input tree.
    pub fn app_xml_path(&self) -> PathBuf {
        self.input_root.join("code").join("app.xml")
    }

    /// Path of the certificate chain asset, when the input provides one.
    pub fn cert_source(&self) -> PathBuf {
        self.input_root.join("meta").join(nuspack_schema::CERT_FILE)
    }

    /// Convenience accessor, see [`TitleIdentity::group_id`].
    pub fn group_id(&self) -> u16 {
        self.identity.group_id()
    }

    /// Convenience accessor, see [`TitleIdentity::parent_id`].
    pub fn parent_id(&self) -> u64 {
        self.identity.parent_id()
    }
}

/// Validate an input root without a full configuration (used by the CLI
/// before identity fields are final).
pub fn input_root_is_valid(input_root: &Path) -> bool {
    INPUT_SUBDIRS.iter().all(|sub| input_root.join(sub).is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(title_id: u64) -> TitleIdentity {
        TitleIdentity {
            title_id,
            title_version: 0,
            os_version: 0x0005_0010_1000_400A,
            app_type: 0x8000_0000,
        }
    }

    #[test]
    fn group_id_is_bits_8_to_23() {
        assert_eq!(identity(0x0005_0000_1010_9B00).group_id(), 0x109B);
        assert_eq!(identity(0x0005_0000_0000_0001).group_id(), 0x0000);
    }

    #[test]
    fn parent_id_masks_variant_nibble() {
        assert_eq!(
            identity(0x0005_000E_1010_9B00).parent_id(),
            0x0005_0000_1010_9B00
        );
        // A base title is its own parent.
        assert_eq!(
            identity(0x0005_0000_1010_9B00).parent_id(),
            0x0005_0000_1010_9B00
        );
    }

    #[test]
    fn missing_subdir_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("code")).unwrap();
        std::fs::create_dir(dir.path().join("meta")).unwrap();

        let config = PackageConfig::new(
            dir.path(),
            identity(0x0005_0000_1000_0001),
            Key::from_bytes([0x41; 16]),
            Key::from_bytes([0x42; 16]),
        );
        match config.validate_input_root() {
            Err(PackError::Configuration(msg)) => assert!(msg.contains("content")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}

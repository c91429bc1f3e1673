//! Package orchestration: one build from configuration to output files.
//!
//! The build is a linear pipeline: validate configuration, resolve content
//! rules, wrap the title key, encrypt and digest every content in index
//! order, serialize the TMD and Ticket, then publish. All artifacts are
//! produced inside a transient working directory and moved into the output
//! directory only once the whole set is complete, so a failed run never
//! leaves a package that looks finished. The working directory is removed
//! on every exit path.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use nuspack_schema::{
    CERT_FILE, TICKET_FILE, TMD_FILE, Ticket, Tmd, TmdContent, content_file_name,
};
use tracing::{debug, info, warn};

use crate::config::PackageConfig;
use crate::content::{ContentDescriptor, ContentResult};
use crate::crypto::{self, TitleKey};
use crate::digest::ContentDigester;
use crate::error::PackError;
use crate::rules;

/// How the build obtains its title key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TitleKeySource {
    /// Use the configuration's encryption key (reproducible builds).
    Configured,
    /// Draw a fresh random key for this build.
    Generated,
}

/// One package build. Owns the configuration and all intermediate state
/// for the duration of [`NusPackage::pack_contents`]; nothing is shared
/// across builds.
#[derive(Debug)]
pub struct NusPackage {
    config: PackageConfig,
    key_source: TitleKeySource,
}

/// Operator-facing summary of the ticket fields a build produced.
#[derive(Debug, Clone)]
pub struct TicketSummary {
    /// Derived ticket id.
    pub ticket_id: u64,
    /// Title id the package was built for.
    pub title_id: u64,
    /// Title version.
    pub title_version: u16,
    /// Title key as wrapped into the ticket.
    pub wrapped_title_key: [u8; 16],
    /// Index of the common key the title key is wrapped under.
    pub common_key_index: u8,
    /// Number of contents in the package.
    pub content_count: u16,
}

impl NusPackage {
    /// Create a build that encrypts under the configured key.
    pub fn new(config: PackageConfig) -> Self {
        Self {
            config,
            key_source: TitleKeySource::Configured,
        }
    }

    /// Create a build that draws a fresh random title key. The plaintext
    /// key never leaves the build; only its wrapped form is observable.
    pub fn with_generated_title_key(config: PackageConfig) -> Self {
        Self {
            config,
            key_source: TitleKeySource::Generated,
        }
    }

    /// The configuration this build runs with.
    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    /// Run the build and write the finished package into `output_dir`.
    ///
    /// # Errors
    ///
    /// Any [`PackError`] aborts the build. Partially written outputs and
    /// the transient working directory are cleaned up before returning.
    pub fn pack_contents(&self, output_dir: &Path) -> Result<TicketSummary, PackError> {
        // Configured -> RulesResolved. Validation runs before anything is
        // created on disk.
        self.config.validate_input_root()?;
        let descriptors = rules::resolve_contents(&self.config.input_root, &self.config.rules)?;
        if descriptors.is_empty() {
            return Err(PackError::Configuration(
                "no contents resolved from input".to_string(),
            ));
        }
        info!(contents = descriptors.len(), "content rules resolved");

        let created_output = !output_dir.exists();
        fs::create_dir_all(output_dir)?;
        let result = self.pack_into(output_dir, descriptors);
        if result.is_err() && created_output {
            // Don't leave an empty directory behind for a failed build.
            let _ = fs::remove_dir(output_dir);
        }
        result
    }

    fn pack_into(
        &self,
        output_dir: &Path,
        descriptors: Vec<ContentDescriptor>,
    ) -> Result<TicketSummary, PackError> {
        let title_id = self.config.identity.title_id;

        // Working directory on the same filesystem as the output, so the
        // final publish step is a rename. Dropped (and deleted) on every
        // exit path.
        let workdir = tempfile::Builder::new()
            .prefix(".nuspack-tmp")
            .tempdir_in(output_dir)?;
        debug!(workdir = %workdir.path().display(), "created working directory");

        let title_key = match self.key_source {
            TitleKeySource::Configured => TitleKey::fixed(self.config.encryption_key),
            TitleKeySource::Generated => TitleKey::generate(),
        };
        let wrapped_title_key = title_key.wrap(&self.config.encrypt_with_key, title_id);

        // RulesResolved -> ContentsProcessed. One pre-allocated slot per
        // content; strict index order, each content completes before the
        // next starts.
        let mut slots: Vec<Option<ContentResult>> = Vec::new();
        slots.resize_with(descriptors.len(), || None);
        for descriptor in descriptors {
            let slot = usize::from(descriptor.index);
            info!(
                index = descriptor.index,
                path = %descriptor.rel_path,
                flags = %descriptor.flags,
                "encrypting content"
            );

            let source = File::open(&descriptor.source)?;
            let out_path = workdir.path().join(content_file_name(descriptor.id));
            let out = BufWriter::new(File::create(&out_path)?);

            let mut digester = ContentDigester::new(descriptor.is_hashed());
            let crypt = crypto::encrypt_content(
                source,
                out,
                &title_key,
                descriptor.index,
                &mut digester,
            )?;
            let result = ContentResult {
                descriptor,
                plaintext_size: crypt.plaintext_len,
                encrypted_size: crypt.encrypted_len,
                digest: digester.finalize(),
            };
            if slots[slot].replace(result).is_some() {
                return Err(PackError::Integrity(format!(
                    "content slot {slot} produced twice"
                )));
            }
        }
        let results: Vec<ContentResult> = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| PackError::Integrity(format!("content slot {i} never filled")))
            })
            .collect::<Result<_, _>>()?;

        // ContentsProcessed -> MetadataBuilt.
        let tmd = Tmd {
            os_version: self.config.identity.os_version,
            title_id,
            app_type: self.config.identity.app_type,
            group_id: self.config.group_id(),
            title_version: self.config.identity.title_version,
            contents: results
                .iter()
                .map(|r| TmdContent {
                    id: r.descriptor.id,
                    index: r.descriptor.index,
                    flags: r.descriptor.flags,
                    encrypted_size: r.encrypted_size,
                    digest: r.digest,
                })
                .collect(),
        };
        let ticket = Ticket {
            wrapped_title_key,
            ticket_id: Ticket::ticket_id_for(title_id),
            title_id,
            title_version: self.config.identity.title_version,
        };
        fs::write(workdir.path().join(TMD_FILE), tmd.to_bytes())?;
        fs::write(workdir.path().join(TICKET_FILE), ticket.to_bytes())?;

        // The certificate chain is a static external asset, copied
        // through unchanged when the input provides it.
        let cert_source = self.config.cert_source();
        let has_cert = cert_source.is_file();
        if has_cert {
            fs::copy(&cert_source, workdir.path().join(CERT_FILE))?;
        } else {
            warn!(
                "no certificate chain at {}; package will lack {CERT_FILE}",
                cert_source.display()
            );
        }

        // MetadataBuilt -> Written. Publish the complete artifact set.
        let mut outputs: Vec<PathBuf> = results
            .iter()
            .map(|r| PathBuf::from(content_file_name(r.descriptor.id)))
            .collect();
        outputs.push(PathBuf::from(TMD_FILE));
        outputs.push(PathBuf::from(TICKET_FILE));
        if has_cert {
            outputs.push(PathBuf::from(CERT_FILE));
        }
        let mut moved: Vec<PathBuf> = Vec::new();
        for name in &outputs {
            match fs::rename(workdir.path().join(name), output_dir.join(name)) {
                Ok(()) => moved.push(output_dir.join(name)),
                Err(e) => {
                    // Half-published packages must not look complete.
                    for path in &moved {
                        let _ = fs::remove_file(path);
                    }
                    return Err(PackError::Io(e));
                }
            }
        }
        info!(
            files = outputs.len(),
            output = %output_dir.display(),
            "package written"
        );

        // Written -> Done. `title_key` zeroizes on drop here.
        Ok(TicketSummary {
            ticket_id: ticket.ticket_id,
            title_id,
            title_version: self.config.identity.title_version,
            wrapped_title_key,
            common_key_index: 0,
            content_count: results.len() as u16,
        })
    }

    /// Print an operator-readable report of the ticket fields produced by
    /// [`NusPackage::pack_contents`].
    pub fn print_ticket_infos(summary: &TicketSummary) {
        println!("Ticket information:");
        println!("TicketID       : {:016X}", summary.ticket_id);
        println!("TitleID        : {:016X}", summary.title_id);
        println!("TitleVersion   : {}", summary.title_version);
        println!(
            "Encrypted key  : {}",
            hex::encode_upper(summary.wrapped_title_key)
        );
        println!("CommonKeyIndex : {}", summary.common_key_index);
        println!("Contents       : {}", summary.content_count);
    }
}

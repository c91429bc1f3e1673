//! `nuspack` - builds an installable NUS package from a decrypted title
//! tree (`code/`, `content/`, `meta/`).
//!
//! All packaging logic lives in `nuspack-core`; this binary is argument
//! handling, the key-fallback ladder, the optional app.xml identity
//! override, and the operator-facing configuration report.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use nuspack_core::{NusPackage, PackageConfig, TitleIdentity, app_xml, config};
use nuspack_schema::{DEFAULT_ENCRYPT_WITH_KEY, DEFAULT_ENCRYPTION_KEY, ENCRYPT_WITH_FILE, Key};

#[derive(Parser, Debug)]
#[command(name = "nuspack", version, about = "NUS package builder", long_about = None)]
struct Args {
    /// Directory with the decrypted data; must contain the code, content
    /// and meta folders
    #[arg(long = "in", default_value = "input")]
    input: PathBuf,

    /// Where the installable package will be saved
    #[arg(long = "out", default_value = "output")]
    output: PathBuf,

    /// Title id as hex (e.g. 0005000010000001); parsed from app.xml when
    /// omitted
    #[arg(long = "tid", value_parser = parse_hex_u64)]
    title_id: Option<u64>,

    /// Target OS version as hex
    #[arg(long = "os-version", value_parser = parse_hex_u64, default_value = "000500101000400A")]
    os_version: u64,

    /// App type as hex
    #[arg(long = "app-type", value_parser = parse_hex_u32, default_value = "80000000")]
    app_type: u32,

    /// Title version as hex
    #[arg(long = "title-version", value_parser = parse_hex_u16, default_value = "0")]
    title_version: u16,

    /// Key used to encrypt the package contents (32 hex chars)
    #[arg(long = "encryption-key", default_value = "")]
    encryption_key: String,

    /// Key used to encrypt the encryption key (32 hex chars); loaded from
    /// encryptKeyWith.txt when omitted
    #[arg(long = "encrypt-key-with", default_value = "")]
    encrypt_key_with: String,

    /// Disable app.xml parsing
    #[arg(long = "skip-xml-parsing", default_value_t = false)]
    skip_xml_parsing: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("nuspack v{}\n", env!("CARGO_PKG_VERSION"));
    let args = Args::parse();

    if !config::input_root_is_valid(&args.input) {
        bail!(
            "invalid input dir ({}): it's missing either the code, content or meta folder",
            args.input.display()
        );
    }

    let encryption_key = resolve_encryption_key(&args.encryption_key);
    let encrypt_with_key = resolve_wrap_key(&args.encrypt_key_with);

    let mut identity = TitleIdentity {
        title_id: args.title_id.unwrap_or(0),
        title_version: args.title_version,
        os_version: args.os_version,
        app_type: args.app_type,
    };

    if args.skip_xml_parsing {
        println!("Skipped app.xml parsing");
    } else {
        println!("Parsing app.xml in the code folder (--skip-xml-parsing disables this)");
        let app_xml_path = args.input.join("code").join("app.xml");
        match app_xml::parse(&app_xml_path) {
            Ok(info) => identity = info.into_identity(),
            Err(e) => warn!(
                "could not use the app.xml at {}: {e}; continuing with the provided values",
                app_xml_path.display()
            ),
        }
    }

    let pkg_config = PackageConfig::new(&args.input, identity, encryption_key, encrypt_with_key);
    print_configuration(&args, &pkg_config);

    let package = NusPackage::new(pkg_config);
    let summary = package.pack_contents(&args.output)?;
    NusPackage::print_ticket_infos(&summary);

    Ok(())
}

/// Invalid or missing encryption keys fall back to the documented default
/// so a build always completes.
fn resolve_encryption_key(raw: &str) -> Key {
    match Key::from_hex(raw) {
        Ok(key) => key,
        Err(_) => {
            let fallback = Key::from_hex(DEFAULT_ENCRYPTION_KEY)
                .expect("default encryption key is valid hex");
            warn!("empty or invalid encryption key provided, using {fallback} instead");
            fallback
        }
    }
}

/// Wrap-key ladder: command line, then the key file, then the default
/// (with a loud warning - the default cannot produce installable
/// packages on real hardware).
fn resolve_wrap_key(raw: &str) -> Key {
    if let Ok(key) = Key::from_hex(raw) {
        return key;
    }
    println!("Will try to load the encrypt-with key from \"{ENCRYPT_WITH_FILE}\".");
    if let Some(key) = load_wrap_key_file() {
        return key;
    }
    let fallback =
        Key::from_hex(DEFAULT_ENCRYPT_WITH_KEY).expect("default wrap key is valid hex");
    warn!("!!! empty or invalid encrypt-with key provided, using {fallback} instead !!!");
    fallback
}

fn load_wrap_key_file() -> Option<Key> {
    let line = match std::fs::read_to_string(ENCRYPT_WITH_FILE) {
        Ok(text) => text.lines().next().unwrap_or("").trim().to_string(),
        Err(e) => {
            warn!("failed to read \"{ENCRYPT_WITH_FILE}\": {e}");
            return None;
        }
    };
    Key::from_hex(&line).ok()
}

fn print_configuration(args: &Args, config: &PackageConfig) {
    println!();
    println!("Configuration:");
    println!("Input            : \"{}\"", args.input.display());
    println!("Output           : \"{}\"", args.output.display());
    println!("TitleID          : {:016X}", config.identity.title_id);
    println!("GroupID          : {:04X}", config.group_id());
    println!("ParentID         : {:016X}", config.parent_id());
    println!("AppType          : {:08X}", config.identity.app_type);
    println!("OSVersion        : {:016X}", config.identity.os_version);
    println!("TitleVersion     : {}", config.identity.title_version);
    println!("Encryption key   : {}", config.encryption_key);
    println!("Encrypt key with : {}", config.encrypt_with_key);
    println!();
}

fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(trimmed, 16).map_err(|e| e.to_string())
}

fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(trimmed, 16).map_err(|e| e.to_string())
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(trimmed, 16).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsers_accept_plain_and_prefixed() {
        assert_eq!(parse_hex_u64("000500101000400A").unwrap(), 0x0005_0010_1000_400A);
        assert_eq!(parse_hex_u64("0x10").unwrap(), 0x10);
        assert_eq!(parse_hex_u32("80000000").unwrap(), 0x8000_0000);
        assert_eq!(parse_hex_u16("0").unwrap(), 0);
        assert!(parse_hex_u64("nothex").is_err());
    }

    #[test]
    fn short_encryption_key_falls_back_to_default() {
        // 31 characters: one short of a valid key.
        let key = resolve_encryption_key("0011223344556677889900112233445");
        assert_eq!(key, Key::from_hex(DEFAULT_ENCRYPTION_KEY).unwrap());
    }

    #[test]
    fn valid_encryption_key_is_used_verbatim() {
        let key = resolve_encryption_key("41414141414141414141414141414141");
        assert_eq!(key.as_bytes(), &[0x41; 16]);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsing and secure repackaging of the cert zip a submitter may attach
//! (§4.5 "Secure cert repackaging", §6 cert zip contents contract).

use std::io::{Cursor, Read};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::CertsError;

/// What a cert zip decomposes into.
pub struct ParsedCerts {
    pub p12: Vec<u8>,
    pub p12_password: String,
    pub provisioning_profiles: Vec<Vec<u8>>,
}

/// Parse a cert zip's bytes. Tolerant of a missing password file (treated
/// as empty); fails with `Malformed` when no `.p12` entry exists at all.
pub fn parse_cert_zip(bytes: &[u8]) -> Result<ParsedCerts, CertsError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|_| CertsError::InvalidZip)?;

    let mut p12: Option<Vec<u8>> = None;
    let mut password: Option<String> = None;
    let mut provisioning_profiles = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|_| CertsError::InvalidZip)?;
        let name = entry.name().to_string();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;

        if name.ends_with(".p12") && p12.is_none() {
            p12 = Some(contents);
        } else if name.ends_with("password.txt") && password.is_none() {
            password = Some(String::from_utf8_lossy(&contents).trim().to_string());
        } else if name.ends_with(".mobileprovision") {
            provisioning_profiles.push(contents);
        }
    }

    let p12 = p12.ok_or(CertsError::Malformed)?;
    Ok(ParsedCerts { p12, p12_password: password.unwrap_or_default(), provisioning_profiles })
}

/// The JSON bundle delivered to a VM over `certs-secure` (§6). The
/// keychain password is freshly generated per call and never persisted —
/// the VM is ephemeral and is the only consumer.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertsSecureBundle {
    pub p12: String,
    pub p12_password: String,
    pub keychain_password: String,
    pub provisioning_profiles: Vec<String>,
}

pub fn build_secure_bundle(parsed: &ParsedCerts) -> CertsSecureBundle {
    CertsSecureBundle {
        p12: STANDARD.encode(&parsed.p12),
        p12_password: parsed.p12_password.clone(),
        // Plain text, not base64 — §9's open question resolves this in
        // favor of the bootstrap script's test, which forbids base64
        // decoding it.
        keychain_password: hangar_token::generate_secret(),
        provisioning_profiles: parsed.provisioning_profiles.iter().map(|p| STANDARD.encode(p)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options: zip::write::FileOptions<()> =
                zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
            for (name, contents) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn parses_p12_password_and_profiles() {
        let zip = build_zip(&[
            ("team.p12", b"p12-bytes"),
            ("password.txt", b"p12pw"),
            ("dev.mobileprovision", b"dev-profile"),
            ("dist.mobileprovision", b"dist-profile"),
        ]);
        let parsed = parse_cert_zip(&zip).unwrap();
        assert_eq!(parsed.p12, b"p12-bytes");
        assert_eq!(parsed.p12_password, "p12pw");
        assert_eq!(parsed.provisioning_profiles.len(), 2);
    }

    #[test]
    fn missing_password_file_defaults_to_empty() {
        let zip = build_zip(&[("team.p12", b"p12-bytes")]);
        let parsed = parse_cert_zip(&zip).unwrap();
        assert_eq!(parsed.p12_password, "");
    }

    #[test]
    fn no_p12_entry_is_malformed() {
        let zip = build_zip(&[("dev.mobileprovision", b"profile")]);
        let err = parse_cert_zip(&zip).unwrap_err();
        assert!(matches!(err, CertsError::Malformed));
    }

    #[test]
    fn secure_bundle_keychain_password_is_plaintext_and_varies() {
        let parsed = ParsedCerts { p12: b"x".to_vec(), p12_password: "pw".into(), provisioning_profiles: vec![] };
        let first = build_secure_bundle(&parsed);
        let second = build_secure_bundle(&parsed);
        assert_ne!(first.keychain_password, second.keychain_password);
        assert!(!first.keychain_password.contains('='), "URL-safe-no-pad output, not base64 with padding");
    }
}

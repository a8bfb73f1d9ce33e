//! Turns a raw TOTP value into the `otpauth://` URI written to the destination.

use crate::domain::model::TotpUri;
use crate::utils::error::{MigrationError, Result};
use url::Url;

const OTPAUTH_SCHEME: &str = "otpauth://";

fn has_otpauth_scheme(value: &str) -> bool {
    value
        .get(..OTPAUTH_SCHEME.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(OTPAUTH_SCHEME))
}

fn is_base32_char(c: char) -> bool {
    c.is_ascii_alphabetic() || ('2'..='7').contains(&c)
}

/// Strips whitespace and `-` group separators, then checks the base32 alphabet.
pub fn clean_base32_key(raw: &str) -> Result<String> {
    let key: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if key.is_empty() {
        return Err(MigrationError::InvalidSecret {
            reason: "secret is empty".to_string(),
        });
    }

    let data = key.trim_end_matches('=');
    if data.is_empty() {
        return Err(MigrationError::InvalidSecret {
            reason: "secret contains only padding".to_string(),
        });
    }
    if let Some(bad) = data.chars().find(|c| !is_base32_char(*c)) {
        return Err(MigrationError::InvalidSecret {
            reason: format!("character '{}' is not in the base32 alphabet", bad),
        });
    }

    Ok(key)
}

/// Normalizes a secret using the record title as both label and issuer.
pub fn normalize(secret: &str, title: &str) -> Result<TotpUri> {
    normalize_with_issuer(secret, title, None)
}

/// URIs pass through untouched; raw keys are wrapped as
/// `otpauth://totp/<label>?secret=<key>&issuer=<issuer>`.
pub fn normalize_with_issuer(secret: &str, label: &str, issuer: Option<&str>) -> Result<TotpUri> {
    if has_otpauth_scheme(secret) {
        return Ok(TotpUri::new(secret));
    }
    let trimmed = secret.trim();
    if has_otpauth_scheme(trimmed) {
        return Ok(TotpUri::new(trimmed));
    }

    let key = clean_base32_key(trimmed)?;
    let label = label.trim();
    let issuer = issuer.map(str::trim).unwrap_or(label);

    let mut uri = Url::parse("otpauth://totp/").map_err(|e| MigrationError::InvalidSecret {
        reason: e.to_string(),
    })?;
    uri.path_segments_mut()
        .map_err(|()| MigrationError::InvalidSecret {
            reason: "cannot build a TOTP label".to_string(),
        })?
        .pop_if_empty()
        .push(label);
    uri.set_query(Some(&format!(
        "secret={}&issuer={}",
        key,
        urlencoding::encode(issuer)
    )));

    Ok(TotpUri::new(String::from(uri)))
}

/// Checks that a URI looks usable by an authenticator field. Failures are
/// reported, never repaired.
pub fn check_well_formed(uri: &TotpUri) -> std::result::Result<(), String> {
    let parsed = Url::parse(uri.as_str()).map_err(|e| e.to_string())?;
    if !parsed.scheme().eq_ignore_ascii_case("otpauth") {
        return Err("scheme must be `otpauth`".to_string());
    }
    match parsed.host_str() {
        Some(kind) if kind.eq_ignore_ascii_case("totp") || kind.eq_ignore_ascii_case("hotp") => {}
        _ => return Err("type must be `totp` or `hotp`".to_string()),
    }
    let has_secret = parsed
        .query_pairs()
        .any(|(name, value)| name == "secret" && !value.is_empty());
    if !has_secret {
        return Err("missing `secret` parameter".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_raw_key() {
        let uri = normalize("JBSWY3DPEHPK3PXP", "GitHub").unwrap();
        assert_eq!(
            uri.as_str(),
            "otpauth://totp/GitHub?secret=JBSWY3DPEHPK3PXP&issuer=GitHub"
        );
    }

    #[test]
    fn test_strips_whitespace_and_separators() {
        let uri = normalize(" jbsw y3dp\tehpk-3pxp ", "GitHub").unwrap();
        assert!(uri.as_str().starts_with("otpauth://totp/"));
        assert!(uri.as_str().contains("secret=jbswy3dpehpk3pxp"));
    }

    #[test]
    fn test_existing_uri_is_identity() {
        let input = "OTPAUTH://totp/Example:alice?secret=JBSWY3DPEHPK3PXP&issuer=Example";
        assert_eq!(normalize(input, "ignored").unwrap().as_str(), input);

        // Broken URIs are passed through, not repaired
        let broken = "otpauth://nonsense";
        assert_eq!(normalize(broken, "x").unwrap().as_str(), broken);
    }

    #[test]
    fn test_uri_with_surrounding_whitespace_is_trimmed() {
        let uri = normalize("  otpauth://totp/A?secret=ABC  ", "A").unwrap();
        assert_eq!(uri.as_str(), "otpauth://totp/A?secret=ABC");
    }

    #[test]
    fn test_rejects_empty_and_non_base32() {
        assert!(matches!(
            normalize("   ", "GitHub"),
            Err(MigrationError::InvalidSecret { .. })
        ));
        assert!(matches!(
            normalize("JBSWY3DP01", "GitHub"),
            Err(MigrationError::InvalidSecret { .. })
        ));
        assert!(normalize("====", "GitHub").is_err());
    }

    #[test]
    fn test_padding_is_kept_verbatim() {
        let uri = normalize("MZXW6===", "Foo").unwrap();
        assert!(uri.as_str().contains("secret=MZXW6===&"));
    }

    #[test]
    fn test_label_and_issuer_are_encoded() {
        let uri = normalize_with_issuer("JBSWY3DPEHPK3PXP", "My Bank", Some("Bank & Co")).unwrap();
        assert_eq!(
            uri.as_str(),
            "otpauth://totp/My%20Bank?secret=JBSWY3DPEHPK3PXP&issuer=Bank%20%26%20Co"
        );
    }

    #[test]
    fn test_issuer_spaces_match_label_encoding() {
        let uri = normalize("JBSWY3DPEHPK3PXP", "My Bank").unwrap();
        assert_eq!(
            uri.as_str(),
            "otpauth://totp/My%20Bank?secret=JBSWY3DPEHPK3PXP&issuer=My%20Bank"
        );
        assert!(check_well_formed(&uri).is_ok());
    }

    #[test]
    fn test_check_well_formed() {
        let good = normalize("JBSWY3DPEHPK3PXP", "GitHub").unwrap();
        assert!(check_well_formed(&good).is_ok());
        assert!(check_well_formed(&TotpUri::new("otpauth://totp/x")).is_err());
        assert!(check_well_formed(&TotpUri::new("otpauth://steam/x?secret=A")).is_err());
        assert!(check_well_formed(&TotpUri::new("otpauth://")).is_err());
    }
}

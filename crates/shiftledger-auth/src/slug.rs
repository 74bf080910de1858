//! URL-safe company slugs.

use rand::rngs::OsRng;
use rand::Rng;

use shiftledger_core::constants::SLUG_MAX_LENGTH;
use shiftledger_core::error::ShiftledgerError;
use shiftledger_store::Store;

/// Lowercase, non-alphanumerics collapsed to single hyphens, trimmed,
/// truncated. Falls back to "company" if nothing survives.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_hyphen = true; // suppress leading hyphen
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.len() > SLUG_MAX_LENGTH {
        slug.truncate(SLUG_MAX_LENGTH);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    if slug.is_empty() {
        "company".to_string()
    } else {
        slug
    }
}

fn short_suffix() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    (0..6)
        .map(|_| ALPHABET[OsRng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Slugify `company_name`, appending random suffixes until unique.
pub fn generate_unique_slug(store: &Store, company_name: &str) -> Result<String, ShiftledgerError> {
    let base = slugify(company_name);
    if !store.slug_taken(&base)? {
        return Ok(base);
    }
    for _ in 0..10 {
        let candidate = format!("{base}-{}", short_suffix());
        if !store.slug_taken(&candidate)? {
            return Ok(candidate);
        }
    }
    // Practically unreachable; widen the suffix.
    Ok(format!("{base}-{}{}", short_suffix(), short_suffix()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("Demo Hotel & Suites"), "demo-hotel-suites");
        assert_eq!(slugify("  The Grand  "), "the-grand");
        assert_eq!(slugify("Café 42"), "caf-42");
        assert_eq!(slugify("!!!"), "company");
    }

    #[test]
    fn slugify_truncates() {
        let long = "a very long hotel name that keeps going and going and going";
        let slug = slugify(long);
        assert!(slug.len() <= SLUG_MAX_LENGTH);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn collision_gets_a_suffix() {
        let dir = std::env::temp_dir().join("shiftledger_slug_test_collision");
        let _ = std::fs::remove_dir_all(&dir);
        let store = Store::open(&dir).unwrap();

        let first = generate_unique_slug(&store, "Demo Hotel").unwrap();
        assert_eq!(first, "demo-hotel");

        // Claim it, then ask again.
        let company = shiftledger_core::company::Company {
            id: shiftledger_core::types::CompanyId::generate(),
            name: "Demo Hotel".to_string(),
            slug: first.clone(),
            kiosk_enabled: false,
            settings: shiftledger_core::company::CompanySettings::default(),
            created_at: chrono::Utc::now(),
        };
        store.insert_company(&company).unwrap();

        let second = generate_unique_slug(&store, "Demo Hotel").unwrap();
        assert_ne!(second, first);
        assert!(second.starts_with("demo-hotel-"));
    }
}

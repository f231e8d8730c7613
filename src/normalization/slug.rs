//! URL slugs for listings: ASCII slugify plus a short checksum fragment so
//! Arabic-only names (which slugify to nothing) and re-posted duplicates still
//! get distinct, re-run-stable slugs.

use sha1::{Digest, Sha1};

const MAX_SLUG_LEN: usize = 255;
const SLUG_CHECKSUM_HEX_LEN: usize = 8;

fn clamp_to_chars(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out = String::with_capacity(max_chars.min(input.len()));
    for (count, ch) in input.chars().enumerate() {
        if count == max_chars {
            break;
        }
        out.push(ch);
    }
    out
}

fn slug_checksum_fragment(name: &str, source_id: i64) -> String {
    let mut hasher = Sha1::new();
    hasher.update(name.trim().as_bytes());
    hasher.update(b"|");
    hasher.update(source_id.to_string().as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{:x}", digest);
    hex.chars().take(SLUG_CHECKSUM_HEX_LEN).collect::<String>()
}

fn slugify_token(input: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Slug for a listing: slugified name (or "listing" when the name has no
/// ASCII) plus a checksum over (name, source id).
pub fn listing_slug(name: &str, source_id: i64) -> String {
    let mut base = slugify_token(name);
    if base.is_empty() {
        base = "listing".to_string();
    }

    // Clamp base to leave room for checksum.
    let checksum = slug_checksum_fragment(name, source_id);
    let checksum_len = checksum.chars().count();
    let max_base_chars = MAX_SLUG_LEN.saturating_sub(checksum_len + 1).max(1);
    if base.chars().count() > max_base_chars {
        base = clamp_to_chars(&base, max_base_chars);
        base = base.trim_matches('-').to_string();
        if base.is_empty() {
            base = checksum.clone();
        }
    }

    format!("{}-{}", base, checksum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_stable_across_runs() {
        let a = listing_slug("Apartment in Rehab 150sqm", 42);
        let b = listing_slug("Apartment in Rehab 150sqm", 42);
        assert_eq!(a, b);
        assert!(a.starts_with("apartment-in-rehab-150sqm-"));
    }

    #[test]
    fn arabic_only_name_falls_back_to_checksummed_stub() {
        let slug = listing_slug("شقة في التجمع الخامس", 7);
        assert!(slug.starts_with("listing-"));
        assert_ne!(slug, listing_slug("شقة في التجمع الخامس", 8));
    }

    #[test]
    fn identical_names_with_different_source_ids_do_not_collide() {
        assert_ne!(listing_slug("Villa", 1), listing_slug("Villa", 2));
    }
}

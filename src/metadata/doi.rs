//! DOI normalization for lookup keys.
//!
//! Language models and PDF text report DOIs in many spellings
//! (`https://doi.org/…`, `doi: 10.…`, percent-encoded). Lookups need the bare
//! `10.<registrant>/<suffix>` form.

/// Strips URL and `doi:` prefixes, percent-decodes and trims.
///
/// Returns `None` when the result does not look like a DOI (`10.` prefix and a
/// non-empty suffix after `/`).
#[must_use]
pub fn normalize_doi(input: &str) -> Option<String> {
    let mut doi = input.trim();

    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
    ] {
        if let Some(stripped) = doi.strip_prefix(prefix) {
            doi = stripped;
            break;
        }
    }

    if doi.len() >= 4 && doi.is_char_boundary(4) && doi[..4].eq_ignore_ascii_case("doi:") {
        doi = doi[4..].trim_start();
    }

    let decoded = match urlencoding::decode(doi) {
        Ok(decoded) => decoded.trim().to_string(),
        Err(_) => doi.trim().to_string(),
    };

    let (prefix, suffix) = decoded.split_once('/')?;
    if !prefix.starts_with("10.") || prefix.len() <= 3 || suffix.trim().is_empty() {
        return None;
    }
    Some(decoded)
}

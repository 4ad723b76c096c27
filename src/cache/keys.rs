//! Cache key construction and invalidation pattern families.
//!
//! Keys are deterministic functions of a query's full semantic identity:
//! every filter parameter and the acting user's id go into the hashed params,
//! nothing else (no timestamps, no request ids). Two identical queries always
//! produce the identical key.
//!
//! Namespace convention:
//! - list queries:   `{domain}:{op}:{hash}`, invalidated as `{domain}:{op}:*`
//! - detail queries: `{domain}:{id}:{hash}`, invalidated as `{domain}:{id}:*`

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

fn params_hash<T: Serialize>(params: &T) -> Result<String> {
    // serde_json emits struct fields in declaration order, so the encoding is
    // canonical as long as callers use structs or ordered maps for params.
    let encoded = serde_json::to_string(params).context("Failed to encode cache key params")?;
    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Key for a list-style query: `{domain}:{op}:{hash}`.
pub fn query_key<T: Serialize>(domain: &str, op: &str, params: &T) -> Result<String> {
    Ok(format!("{}:{}:{}", domain, op, params_hash(params)?))
}

/// Key for a detail query scoped to one resource: `{domain}:{id}:{hash}`.
pub fn detail_key<T: Serialize>(domain: &str, id: &str, params: &T) -> Result<String> {
    Ok(format!("{}:{}:{}", domain, id, params_hash(params)?))
}

/// Patterns that go stale when a listing is created or updated.
///
/// Sharded narrowly: every list view of listings, plus the per-listing detail
/// family. Over-matching only costs hit-rate, never correctness.
pub fn listing_write_patterns(listing_id: &str) -> Vec<String> {
    vec![
        "listings:list:*".to_string(),
        format!("listings:{}:*", listing_id),
    ]
}

/// Patterns that go stale when a user's profile or match inputs change.
pub fn match_write_patterns(user_id: usize) -> Vec<String> {
    vec![format!("matches:{}:*", user_id)]
}

/// Translate a glob pattern (`*`, `?`, literal text) into an anchored regex.
///
/// Used by the in-memory store's `KEYS`; the remote backend matches globs
/// server-side.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).with_context(|| format!("Invalid glob pattern: {}", pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct ListingQuery<'a> {
        city: &'a str,
        max_rent: u32,
        user_id: usize,
    }

    #[test]
    fn identical_params_produce_identical_keys() {
        let a = ListingQuery {
            city: "porto",
            max_rent: 900,
            user_id: 7,
        };
        let b = ListingQuery {
            city: "porto",
            max_rent: 900,
            user_id: 7,
        };
        assert_eq!(
            query_key("listings", "list", &a).unwrap(),
            query_key("listings", "list", &b).unwrap()
        );
    }

    #[test]
    fn different_params_produce_different_keys() {
        let a = ListingQuery {
            city: "porto",
            max_rent: 900,
            user_id: 7,
        };
        let b = ListingQuery {
            city: "porto",
            max_rent: 900,
            user_id: 8,
        };
        assert_ne!(
            query_key("listings", "list", &a).unwrap(),
            query_key("listings", "list", &b).unwrap()
        );
    }

    #[test]
    fn keys_follow_namespace_convention() {
        let key = query_key("listings", "list", &("porto", 900)).unwrap();
        assert!(key.starts_with("listings:list:"));

        let key = detail_key("listings", "L42", &7usize).unwrap();
        assert!(key.starts_with("listings:L42:"));
    }

    #[test]
    fn listing_write_patterns_cover_list_and_detail_families() {
        let patterns = listing_write_patterns("L42");
        assert_eq!(patterns, vec!["listings:list:*", "listings:L42:*"]);
    }

    #[test]
    fn match_write_patterns_are_sharded_per_user() {
        assert_eq!(match_write_patterns(7), vec!["matches:7:*"]);
    }

    #[test]
    fn glob_star_matches_key_family() {
        let re = glob_to_regex("listings:list:*").unwrap();
        assert!(re.is_match("listings:list:abc123"));
        assert!(re.is_match("listings:list:"));
        assert!(!re.is_match("listings:L42:abc123"));
        assert!(!re.is_match("matches:listings:list:x"));
    }

    #[test]
    fn glob_question_mark_matches_single_char() {
        let re = glob_to_regex("listings:L?:x").unwrap();
        assert!(re.is_match("listings:L1:x"));
        assert!(!re.is_match("listings:L12:x"));
    }

    #[test]
    fn glob_escapes_regex_metacharacters() {
        let re = glob_to_regex("a.b+c:*").unwrap();
        assert!(re.is_match("a.b+c:tail"));
        assert!(!re.is_match("aXb+c:tail"));
    }
}

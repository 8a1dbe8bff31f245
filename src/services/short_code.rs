use crate::error::{AppError, AppResult};
use crate::store::Store;
use regex::Regex;
use std::sync::OnceLock;

/// Character set for random short codes (base 36, lowercase).
const ALPHABET_CHARS: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm',
    'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

fn custom_code_regex() -> &'static Regex {
    static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
    CODE_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_-]{4,16}$").expect("short code pattern is a valid regex")
    })
}

/// Service for producing short codes that are unique in the link namespace.
pub struct ShortCodeService;

impl ShortCodeService {
    /// A random code of `length` characters; uniqueness is not checked.
    pub fn random(length: usize) -> String {
        nanoid::nanoid!(length, ALPHABET_CHARS)
    }

    /// Check that a caller-chosen code has an acceptable shape.
    pub fn validate_custom(code: &str) -> AppResult<()> {
        if !custom_code_regex().is_match(code) {
            return Err(AppError::Validation(
                "Custom code must be 4-16 alphanumeric characters, underscores, or hyphens"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Accept a caller-supplied slug if it is well formed and not taken.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed slug, `DuplicateSlug` if another link owns it.
    pub async fn claim_custom(slug: &str, store: &dyn Store) -> AppResult<String> {
        Self::validate_custom(slug)?;

        if store.short_code_exists(slug).await? {
            return Err(AppError::DuplicateSlug(slug.to_string()));
        }

        Ok(slug.to_string())
    }

    /// Generate a random short code that doesn't already exist in the store.
    ///
    /// The store's uniqueness constraint remains the final arbiter: a code
    /// that passes this check can still lose a race at insert time.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CodeSpaceExhausted` if every one of `max_attempts`
    /// candidates collided with an existing code.
    pub async fn generate(length: usize, max_attempts: u32, store: &dyn Store) -> AppResult<String> {
        for attempt in 1..=max_attempts {
            let code = Self::random(length);

            if !store.short_code_exists(&code).await? {
                return Ok(code);
            }

            tracing::debug!(attempt, "Short code collision, regenerating");
        }

        Err(AppError::CodeSpaceExhausted)
    }
}

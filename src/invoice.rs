// neon_pay/src/invoice.rs
// Invoice ID generation: `{slug}-{4 digits}`

use rand::Rng;

const MAX_SLUG_LEN: usize = 12;
const FALLBACK_SLUG: &str = "user";

/// Lowercase the name and keep only `[a-z0-9]`, capped at 12 characters.
/// Returns `"user"` when nothing survives.
pub fn slugify(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(MAX_SLUG_LEN)
        .collect();

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Generate an invoice id for a display name using the thread RNG.
///
/// Not unique: two payments by the same name can collide.
pub fn generate_invoice_id(name: &str) -> String {
    generate_invoice_id_with(name, &mut rand::thread_rng())
}

pub fn generate_invoice_id_with<R: Rng>(name: &str, rng: &mut R) -> String {
    let suffix: u16 = rng.gen_range(1000..=9999);
    format!("{}-{}", slugify(name), suffix)
}

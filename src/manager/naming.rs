//! Display-name prompt and reply sanitising

/// Fixed prompt sent to the backend for a display name
pub(crate) const NAMING_PROMPT: &str = "Generate a single creative one-word name for an AI \
    assistant. Just respond with the name, nothing else. Examples: Zephyr, Nova, Echo, Sage, \
    Pixel, Nexus, Atlas, Cosmo, Indigo, Phoenix, Vortex, Nimbus, Prism, Catalyst, Zenith, \
    Quantum, Cipher, Blaze, Flux, Nebula, Spark, Glitch, Rune, Axiom, Byte. One weird fun name. \
    Return only a single word.";

/// Reduce a backend reply to one capitalised alphanumeric token
///
/// Takes the first word, drops everything that is not alphanumeric, then
/// upper-cases the first character and lower-cases the rest. Returns `None`
/// when nothing is left.
pub(crate) fn sanitize_name(reply: &str) -> Option<String> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    let word: String = reply
        .trim_start_matches(|c: char| !is_word(c))
        .chars()
        .take_while(|&c| is_word(c))
        .filter(|c| c.is_alphanumeric())
        .collect();

    let mut chars = word.chars();
    let first = chars.next()?;
    Some(
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_word_and_capitalises() {
        assert_eq!(sanitize_name("zephyr").as_deref(), Some("Zephyr"));
        assert_eq!(sanitize_name("  NOVA is my pick").as_deref(), Some("Nova"));
        assert_eq!(sanitize_name("**Glitch**!").as_deref(), Some("Glitch"));
    }

    #[test]
    fn strips_non_alphanumerics_inside_the_word() {
        assert_eq!(sanitize_name("pix_el2").as_deref(), Some("Pixel2"));
    }

    #[test]
    fn empty_or_symbol_only_reply_yields_none() {
        assert_eq!(sanitize_name(""), None);
        assert_eq!(sanitize_name("   "), None);
        assert_eq!(sanitize_name("!!! ???"), None);
        assert_eq!(sanitize_name("___"), None);
    }
}

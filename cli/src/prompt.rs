use anyhow::anyhow;
use inquire::Confirm;
use inquire::Text;

/// Phrase the user must type before a wipe.
pub(crate) const WIPE_PHRASE: &str = "DELETE ALL";

pub(crate) fn confirm(message: &str) -> anyhow::Result<bool> {
    Confirm::new(message)
        .with_default(false)
        .prompt()
        .map_err(|err| anyhow!("confirmation cancelled: {err}"))
}

/// Asks the user to retype `phrase` exactly.
pub(crate) fn confirm_phrase(phrase: &str) -> anyhow::Result<bool> {
    let typed = Text::new(&format!("Type '{phrase}' to continue:"))
        .prompt()
        .map_err(|err| anyhow!("confirmation cancelled: {err}"))?;
    Ok(phrase_matches(&typed, phrase))
}

fn phrase_matches(typed: &str, phrase: &str) -> bool {
    typed.trim() == phrase
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_must_match_exactly() {
        assert!(phrase_matches("DELETE ALL", WIPE_PHRASE));
        assert!(phrase_matches("  DELETE ALL\n", WIPE_PHRASE));
        assert!(!phrase_matches("delete all", WIPE_PHRASE));
        assert!(!phrase_matches("DELETE", WIPE_PHRASE));
    }
}

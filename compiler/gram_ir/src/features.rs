//! Grammar capability flags.
//!
//! Every element contributes flags to its owning rule, and every rule to
//! the compiled grammar. Flags are OR-accumulated bottom-up during
//! lowering; the compiled header records whether any extended
//! (non-standard) construct was used.

use bitflags::bitflags;

bitflags! {
    /// Constructs used by a rule or grammar.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct GrammarFeatures: u32 {
        /// Word-subset matching.
        const SUBSET = 1 << 0;
        /// Dictation references.
        const DICTATION = 1 << 1;
        /// Wildcard (garbage) matching.
        const WILDCARD = 1 << 2;
        /// Rule references that store their result under a semantic key.
        const SEMANTIC_KEYS = 1 << 3;
        /// Script callbacks attached to rules.
        const SCRIPT_HOOKS = 1 << 4;
        /// Rules marked dynamic.
        const DYNAMIC_RULES = 1 << 5;

        /// Everything outside the standard grammar notation.
        const EXTENDED = Self::SUBSET.bits()
            | Self::DICTATION.bits()
            | Self::WILDCARD.bits()
            | Self::SEMANTIC_KEYS.bits()
            | Self::SCRIPT_HOOKS.bits();
    }
}

impl GrammarFeatures {
    /// Returns `true` if any extended construct is present.
    #[inline]
    pub fn uses_extended(self) -> bool {
        self.intersects(Self::EXTENDED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_rules_are_not_extended() {
        assert!(!GrammarFeatures::DYNAMIC_RULES.uses_extended());
        assert!(!GrammarFeatures::empty().uses_extended());
    }

    #[test]
    fn each_extended_flag_counts() {
        for flag in [
            GrammarFeatures::SUBSET,
            GrammarFeatures::DICTATION,
            GrammarFeatures::WILDCARD,
            GrammarFeatures::SEMANTIC_KEYS,
            GrammarFeatures::SCRIPT_HOOKS,
        ] {
            assert!(flag.uses_extended(), "{flag:?}");
        }
    }
}

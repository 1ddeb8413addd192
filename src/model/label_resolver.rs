//! Label resolution for Nexus file and Newick tree parsing.
//!
//! Leaf labels found in a Newick string are resolved into [TaxonIndex]
//! values of the run's [TaxonSet], optionally through a Nexus TRANSLATE
//! table.

use crate::model::taxon_set::{TaxonIndex, TaxonSet};
use rustc_hash::FxHashMap;

// =#========================================================================#=
// LABEL RESOLVER
// =#========================================================================#=
/// Resolves labels in Newick strings during parsing.
///
/// - [Verbatim](Self::Verbatim) - raw Newick strings or Nexus without TRANSLATE
/// - [Translated](Self::Translated) - Nexus with a TRANSLATE command
#[derive(Debug, Clone)]
pub enum LabelResolver {
    /// Labels are taxon names.
    ///
    /// With `allow_new`, unknown names are added to the taxon set;
    /// otherwise they fail to resolve.
    Verbatim { allow_new: bool },

    /// Resolves in order:
    /// 1. Key of the TRANSLATE table (e.g. "12" -> "Pukeko")
    /// 2. Integer as 1-based index into the taxon set
    /// 3. Verbatim taxon name
    Translated {
        /// Pre-computed mapping: TRANSLATE key -> taxon
        index_map: FxHashMap<String, TaxonIndex>,
    },
}

impl LabelResolver {
    /// Resolver that accepts known taxon names only.
    pub fn strict() -> Self {
        LabelResolver::Verbatim { allow_new: false }
    }

    /// Resolver that registers unseen taxon names.
    pub fn growing() -> Self {
        LabelResolver::Verbatim { allow_new: true }
    }

    /// Builds a TRANSLATE resolver, registering translated names in `taxa`
    /// if they are not yet present.
    ///
    /// # Arguments
    /// * `translation` - `(key, taxon name)` pairs in file order
    /// * `taxa` - The taxon set of the run
    pub fn translated(translation: &[(String, String)], taxa: &mut TaxonSet) -> Self {
        let index_map = translation
            .iter()
            .map(|(key, label)| (key.clone(), taxa.get_or_insert(label)))
            .collect();
        LabelResolver::Translated { index_map }
    }

    /// Resolves a parsed label to its taxon.
    ///
    /// # Errors
    /// Returns the offending label if it cannot be resolved.
    pub fn resolve(&self, parsed_label: &str, taxa: &mut TaxonSet) -> Result<TaxonIndex, String> {
        match self {
            LabelResolver::Verbatim { allow_new } => match taxa.index_of(parsed_label) {
                Some(index) => Ok(index),
                None if *allow_new => Ok(taxa.get_or_insert(parsed_label)),
                None => Err(parsed_label.to_string()),
            },
            LabelResolver::Translated { index_map } => {
                if let Some(&index) = index_map.get(parsed_label) {
                    return Ok(index);
                }
                if let Ok(nexus_index) = parsed_label.parse::<usize>() {
                    if (1..=taxa.len()).contains(&nexus_index) {
                        return Ok(nexus_index - 1);
                    }
                    return Err(parsed_label.to_string());
                }
                taxa.index_of(parsed_label)
                    .ok_or_else(|| parsed_label.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translated_resolves_key_then_index_then_name() {
        let mut taxa = TaxonSet::from_labels(["Kea", "Kaka"]);
        let translation = vec![("k".to_string(), "Kakapo".to_string())];
        let resolver = LabelResolver::translated(&translation, &mut taxa);

        assert_eq!(resolver.resolve("k", &mut taxa), Ok(2));
        assert_eq!(resolver.resolve("2", &mut taxa), Ok(1));
        assert_eq!(resolver.resolve("Kea", &mut taxa), Ok(0));
        assert!(resolver.resolve("7", &mut taxa).is_err());
        assert!(resolver.resolve("Takahe", &mut taxa).is_err());
    }

    #[test]
    fn verbatim_grows_only_when_allowed() {
        let mut taxa = TaxonSet::from_labels(["Kea"]);
        assert!(LabelResolver::strict().resolve("Weka", &mut taxa).is_err());
        assert_eq!(LabelResolver::growing().resolve("Weka", &mut taxa), Ok(1));
        assert_eq!(taxa.len(), 2);
    }
}

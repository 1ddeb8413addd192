//! Keywords and block names of the Nexus format.
//!
//! Keywords are matched case-insensitively when reading; the spelling here
//! is the one used when writing.

/// Nexus label parsing delimiters: comma, semicolon, equals sign, whitespace
pub(crate) const NEXUS_LABEL_DELIMITERS: &[u8] = b" ,;=\t\n\r";

pub(crate) const NEXUS_HEADER: &[u8] = b"#NEXUS";

pub(crate) const BLOCK_BEGIN: &[u8] = b"Begin";

pub(crate) const BLOCK_END: &[u8] = b"End;";

/// Alternative block terminator
pub(crate) const BLOCK_ENDBLOCK: &[u8] = b"EndBlock;";

// Taxa block
pub(crate) const TAXA: &[u8] = b"taxa";

pub(crate) const DIMENSIONS: &[u8] = b"Dimensions";

pub(crate) const NTAX: &[u8] = b"ntax";

pub(crate) const TAXLABELS: &[u8] = b"Taxlabels";

// Trees block
pub(crate) const TREES: &[u8] = b"trees";

pub(crate) const TRANSLATE: &[u8] = b"Translate";

pub(crate) const TREE: &[u8] = b"tree";

/// Marker of a rooted tree, written in front of its Newick string
pub(crate) const ROOTED: &[u8] = b"[&R]";

/// Blocks of a Nexus file; only TAXA and TREES are read.
#[derive(Debug, PartialEq, Clone)]
pub(crate) enum NexusBlock {
    Taxa,
    Trees,
    Other(String),
}

impl NexusBlock {
    /// Parse a block name (case-insensitive) into a NexusBlock variant
    pub(crate) fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "taxa" => NexusBlock::Taxa,
            "trees" => NexusBlock::Trees,
            _ => NexusBlock::Other(name.to_string()),
        }
    }
}

//! Constants shared by the Newick parser and writer.

/// Newick label delimiters: parentheses, comma, colon, semicolon, comment brackets, whitespace
pub(crate) const NEWICK_LABEL_DELIMITERS: &[u8] = b"([,:; \n\t\r)]";

/// Delimiters of unquoted annotation keys: `[&key=value,...]`
pub(crate) const ANNOTATION_KEY_DELIMITERS: &[u8] = b"=,] \n\t\r";

/// Delimiters of unquoted annotation values, inside or outside of `{...}`
pub(crate) const ANNOTATION_VALUE_DELIMITERS: &[u8] = b",]} \n\t\r";

/// Default guess for number of leaves, when unknown
pub(crate) const DEFAULT_NUM_LEAVES_GUESS: usize = 10;

/// Extra buffer in Newick string length/capacity estimate
pub(crate) const BUFFER_CHARS: usize = 10;

use crate::model::{LabelResolver, TaxonSet, Tree};
use crate::newick::NewickParser;
use crate::nexus::defs::{
    BLOCK_BEGIN, BLOCK_END, BLOCK_ENDBLOCK, DIMENSIONS, NEXUS_HEADER, NEXUS_LABEL_DELIMITERS,
    NTAX, NexusBlock, TAXLABELS, TRANSLATE, TREE,
};
use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::{ByteSource, InMemoryByteSource};
use crate::parser::parsing_error::{ParsingError, ParsingErrorKind};
use rustc_hash::FxHashMap;
use std::path::Path;
use tracing::debug;

// =#========================================================================#=
// NEXUS READER
// =#========================================================================#=
/// Lazy reader of the trees of a Nexus file.
///
/// Construction parses the header, an optional TAXA block and the start
/// of the TREES block including a `TRANSLATE` command. Trees are then
/// parsed one at a time, by [next_tree](Self::next_tree) or by iterating.
/// The whole input stays in memory, so [reset](Self::reset) starts another
/// pass over the trees without touching the file again.
///
/// # Assumptions
/// * The file starts with `#NEXUS`
/// * Blocks other than TAXA and TREES are skipped
/// * A TAXA block, if present, precedes the TREES block and has the commands
///   `DIMENSIONS NTAX=<n>;` and `TAXLABELS <label> ...;`
/// * A `TRANSLATE` command, if present, precedes every `TREE` command:
///   `TRANSLATE <key> <label>, <key> <label>, ...;`
/// * Each tree command has format `tree <name> = [&R] <Newick string>;`
/// * Labels with spaces or punctuation are single-quoted, with apostrophes
///   doubled: `'Wilson''s Storm-petrel'`
///
/// # Label resolution
/// A leaf label in a tree is resolved in order as a TRANSLATE key, a 1-based
/// index into the TAXA block, and a verbatim taxon label. Without a TAXA
/// block or TRANSLATE command, every new label becomes a new taxon.
///
/// # Example
/// ```
/// use cladewick::nexus::NexusReader;
///
/// let nexus = "#NEXUS
/// begin taxa;
///     dimensions ntax=3;
///     taxlabels Kea Kaka Kakapo;
/// end;
/// begin trees;
///     translate 1 Kea, 2 Kaka, 3 Kakapo;
///     tree STATE_0 = [&R] ((1:1,2:1):1,3:2);
///     tree STATE_1000 = [&R] ((1:1,3:1):1,2:2);
/// end;";
///
/// let mut reader = NexusReader::for_str(nexus).unwrap();
/// assert_eq!(reader.count_trees().unwrap(), 2);
/// let trees: Vec<_> = reader.by_ref().collect::<Result<_, _>>().unwrap();
/// assert_eq!(trees[1].name(), Some("STATE_1000"));
/// assert_eq!(reader.taxa().label(2), Some("Kakapo"));
///
/// reader.reset();
/// assert_eq!(reader.count(), 2);
/// ```
pub struct NexusReader<S: ByteSource = InMemoryByteSource> {
    /// Continuously used to parse Newick strings, including resolving labels
    newick_parser: NewickParser,
    /// Accessor to the underlying bytes being parsed
    byte_parser: ByteParser<S>,
    /// Byte position of the first tree command (for reset)
    start_byte_pos: usize,
    /// Number of tree commands, once counted
    num_trees: Option<usize>,
    /// Number of trees returned or skipped in the current pass
    tree_pos: usize,
    /// Whether the current pass hit the end of the TREES block or an error
    finished: bool,
}

/// Content of a TAXA block.
struct TaxaBlock {
    labels: Vec<String>,
}

// ============================================================================
// Construction (pub)
// ============================================================================
impl NexusReader<InMemoryByteSource> {
    /// Reads the whole file into memory and parses up to the first tree.
    pub fn for_file<P: AsRef<Path>>(path: P) -> Result<Self, ParsingError> {
        Self::new(ByteParser::for_file(path)?)
    }

    /// Like [for_file](Self::for_file), with labels resolved against the
    /// given taxa only; labels not in `taxa` are an error.
    pub fn for_file_with_taxa<P: AsRef<Path>>(path: P, taxa: TaxonSet) -> Result<Self, ParsingError> {
        Self::with_taxa(ByteParser::for_file(path)?, taxa)
    }

    /// Parses a Nexus document held in a string.
    pub fn for_str(nexus: &str) -> Result<Self, ParsingError> {
        Self::new(ByteParser::for_str(nexus))
    }
}

impl<S: ByteSource> NexusReader<S> {
    /// Creates a reader whose taxa come from the file itself.
    pub fn new(byte_parser: ByteParser<S>) -> Result<Self, ParsingError> {
        Self::init(byte_parser, None)
    }

    /// Creates a reader that resolves all labels against `taxa`, so trees
    /// of the file share taxon indices with another sample.
    pub fn with_taxa(byte_parser: ByteParser<S>, taxa: TaxonSet) -> Result<Self, ParsingError> {
        Self::init(byte_parser, Some(taxa))
    }

    fn init(byte_parser: ByteParser<S>, fixed_taxa: Option<TaxonSet>) -> Result<Self, ParsingError> {
        let fixed = fixed_taxa.is_some();
        let newick_parser = match fixed_taxa {
            Some(taxa) => NewickParser::with_taxa(taxa),
            None => NewickParser::new(),
        };
        let mut reader = NexusReader {
            newick_parser,
            byte_parser,
            start_byte_pos: 0,
            num_trees: None,
            tree_pos: 0,
            finished: false,
        };

        reader.parse_nexus_header()?;
        let mut taxa_block = None;
        loop {
            match reader.detect_next_block()? {
                NexusBlock::Taxa => taxa_block = Some(reader.parse_taxa_block()?),
                NexusBlock::Trees => break,
                NexusBlock::Other(name) => {
                    debug!(block = name.as_str(), "skipping Nexus block");
                    reader.skip_to_block_end()?;
                }
            }
        }

        let translation = reader.parse_translate()?;
        let resolver = reader.choose_resolver(taxa_block, translation, fixed)?;
        reader.newick_parser.set_resolver(resolver);

        reader.byte_parser.skip_comment_and_whitespace()?;
        reader.start_byte_pos = reader.byte_parser.position();
        Ok(reader)
    }

    /// Picks the [LabelResolver] for the trees of this file.
    fn choose_resolver(&mut self, taxa_block: Option<TaxaBlock>, translation: Option<Vec<(String, String)>>, fixed: bool) -> Result<LabelResolver, ParsingError> {
        // All taxa of the file must be known to a fixed taxon set
        if fixed {
            let declared = taxa_block.iter().flat_map(|b| b.labels.iter());
            let translated = translation.iter().flat_map(|t| t.iter().map(|(_, label)| label));
            for label in declared.chain(translated) {
                if !self.newick_parser.taxa().contains_label(label) {
                    return Err(ParsingError::unresolved_label(
                        &self.byte_parser,
                        format!("Taxon '{label}' is not part of the tree sample"),
                    ));
                }
            }
        }

        let taxa = self.newick_parser.taxa_mut();
        if !fixed {
            for label in taxa_block.iter().flat_map(|b| b.labels.iter()) {
                taxa.get_or_insert(label);
            }
        }
        Ok(match (translation, taxa_block) {
            (Some(translation), _) => LabelResolver::translated(&translation, taxa),
            (None, Some(block)) if fixed => {
                // 1-based indices refer to this file's TAXA block
                let index_map: FxHashMap<String, usize> = block
                    .labels
                    .iter()
                    .enumerate()
                    .filter_map(|(i, label)| taxa.index_of(label).map(|t| ((i + 1).to_string(), t)))
                    .collect();
                LabelResolver::Translated { index_map }
            }
            (None, Some(_)) => LabelResolver::Translated {
                index_map: FxHashMap::default(),
            },
            (None, None) if fixed => LabelResolver::strict(),
            (None, None) => LabelResolver::growing(),
        })
    }
}

// ============================================================================
// Getters, Iteration (pub)
// ============================================================================
impl<S: ByteSource> NexusReader<S> {
    /// The taxa of the file (or the fixed taxa given at construction).
    pub fn taxa(&self) -> &TaxonSet {
        self.newick_parser.taxa()
    }

    /// Consumes the reader and returns its taxa.
    pub fn into_taxa(self) -> TaxonSet {
        self.newick_parser.into_taxa()
    }

    /// Counts the tree commands of the TREES block without parsing them.
    ///
    /// The position of the current pass is kept.
    pub fn count_trees(&mut self) -> Result<usize, ParsingError> {
        if let Some(count) = self.num_trees {
            return Ok(count);
        }
        let count = self.tree_names()?.len();
        self.num_trees = Some(count);
        Ok(count)
    }

    /// Names of all tree commands, in file order, without parsing the trees.
    ///
    /// The position of the current pass is kept.
    pub fn tree_names(&mut self) -> Result<Vec<String>, ParsingError> {
        let saved_pos = self.byte_parser.position();
        self.byte_parser.set_position(self.start_byte_pos);

        let mut names = Vec::new();
        let result = loop {
            match self.scan_tree_command() {
                Ok(Some(name)) => names.push(name),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.byte_parser.set_position(saved_pos);
        result.map(|_| names)
    }

    /// Restarts at the first tree.
    pub fn reset(&mut self) {
        self.byte_parser.set_position(self.start_byte_pos);
        self.tree_pos = 0;
        self.finished = false;
    }

    /// Number of trees returned or skipped since construction or the last reset.
    pub fn position(&self) -> usize {
        self.tree_pos
    }

    /// Skips up to `n` trees without parsing them.
    ///
    /// # Returns
    /// The number of trees actually skipped
    pub fn skip_trees(&mut self, n: usize) -> Result<usize, ParsingError> {
        let mut skipped = 0;
        while skipped < n && !self.finished {
            match self.scan_tree_command()? {
                Some(_) => {
                    skipped += 1;
                    self.tree_pos += 1;
                }
                None => self.finished = true,
            }
        }
        Ok(skipped)
    }

    /// Parses the next tree.
    ///
    /// # Returns
    /// * `Ok(Some(tree))` - The next tree, named after its tree command
    /// * `Ok(None)` - The TREES block is exhausted
    /// * `Err(ParsingError)` - The tree command or Newick string is invalid
    pub fn next_tree(&mut self) -> Result<Option<Tree>, ParsingError> {
        if self.finished {
            return Ok(None);
        }
        let Some(name) = self.parse_tree_command_head()? else {
            self.finished = true;
            return Ok(None);
        };
        let mut tree = self.newick_parser.parse(&mut self.byte_parser)?;
        tree.set_name(name);
        self.tree_pos += 1;
        Ok(Some(tree))
    }
}

impl<S: ByteSource> Iterator for NexusReader<S> {
    type Item = Result<Tree, ParsingError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_tree() {
            Ok(Some(tree)) => Some(Ok(tree)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

// ============================================================================
// Parsing helpers (private)
// ============================================================================
impl<S: ByteSource> NexusReader<S> {
    /// Parses header `#NEXUS` at start of file.
    fn parse_nexus_header(&mut self) -> Result<(), ParsingError> {
        self.byte_parser.skip_comment_and_whitespace()?;
        if !self.byte_parser.consume_if_sequence(NEXUS_HEADER) {
            return Err(ParsingError::missing_nexus_header(&self.byte_parser));
        }
        Ok(())
    }

    /// Consumes the next block header `BEGIN <name>;` and returns the block type.
    fn detect_next_block(&mut self) -> Result<NexusBlock, ParsingError> {
        self.byte_parser.skip_comment_and_whitespace()?;
        if self.byte_parser.is_eof() {
            return Err(ParsingError::from_parser(ParsingErrorKind::NoTree, &self.byte_parser));
        }
        if !self.byte_parser.consume_if_sequence(BLOCK_BEGIN) {
            return Err(ParsingError::invalid_block_name(&self.byte_parser));
        }

        let name = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;
        self.byte_parser.skip_comment_and_whitespace()?;
        if name.is_empty() || !self.byte_parser.consume_if(b';') {
            return Err(ParsingError::invalid_block_name(&self.byte_parser));
        }
        Ok(NexusBlock::from_name(&name))
    }

    /// Consumes `END;` (or `ENDBLOCK;`) if it comes next.
    fn consume_block_end(&mut self) -> bool {
        self.byte_parser.consume_if_sequence(BLOCK_END) || self.byte_parser.consume_if_sequence(BLOCK_ENDBLOCK)
    }

    fn peek_is_block_end(&self) -> bool {
        self.byte_parser.peek_is_sequence(BLOCK_END) || self.byte_parser.peek_is_sequence(BLOCK_ENDBLOCK)
    }

    /// Skips commands until and including the end of the current block.
    fn skip_to_block_end(&mut self) -> Result<(), ParsingError> {
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;
            if self.consume_block_end() {
                return Ok(());
            }
            if !self.byte_parser.consume_statement() {
                return Err(ParsingError::unexpected_eof(&self.byte_parser));
            }
        }
    }

    /// Parses the TAXA block up to and including its end.
    ///
    /// Commands other than `DIMENSIONS` and `TAXLABELS` are skipped.
    fn parse_taxa_block(&mut self) -> Result<TaxaBlock, ParsingError> {
        let mut ntax: Option<usize> = None;
        let mut labels: Option<Vec<String>> = None;
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;
            if self.consume_block_end() {
                break;
            }
            if self.byte_parser.is_eof() {
                return Err(ParsingError::unexpected_eof(&self.byte_parser));
            }

            if self.byte_parser.consume_if_sequence(DIMENSIONS) {
                ntax = Some(self.parse_taxa_block_ntax()?);
            } else if self.byte_parser.consume_if_sequence(TAXLABELS) {
                labels = Some(self.parse_taxa_block_labels()?);
            } else if !self.byte_parser.consume_statement() {
                return Err(ParsingError::unexpected_eof(&self.byte_parser));
            }
        }

        let labels = labels.ok_or_else(|| {
            ParsingError::invalid_taxa_block(&self.byte_parser, String::from("Expected 'TAXLABELS' in TAXA block."))
        })?;
        if let Some(ntax) = ntax {
            if ntax != labels.len() {
                return Err(ParsingError::invalid_taxa_block(
                    &self.byte_parser,
                    format!("Number of parsed labels ({}) did not match ntax value ({ntax}).", labels.len()),
                ));
            }
        }
        Ok(TaxaBlock { labels })
    }

    /// Parses the remainder of `DIMENSIONS ... NTAX=<n> ...;`, returning `n`.
    fn parse_taxa_block_ntax(&mut self) -> Result<usize, ParsingError> {
        let mut ntax = None;
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;
            if self.byte_parser.consume_if(b';') {
                break;
            }
            if self.byte_parser.is_eof() {
                return Err(ParsingError::unexpected_eof(&self.byte_parser));
            }

            let is_ntax = self.byte_parser.consume_if_sequence(NTAX);
            if !is_ntax {
                let key = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;
                if key.is_empty() && !self.byte_parser.peek_is(b'=') {
                    // Stray delimiter such as ','
                    self.byte_parser.next_byte();
                    continue;
                }
            }
            self.byte_parser.skip_whitespace();
            if !self.byte_parser.consume_if(b'=') {
                continue;
            }
            self.byte_parser.skip_whitespace();
            let value = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;
            if is_ntax {
                ntax = Some(value.parse::<usize>().map_err(|_| {
                    ParsingError::invalid_taxa_block(&self.byte_parser, format!("Cannot parse `ntax` value: {value}"))
                })?);
            }
        }

        ntax.ok_or_else(|| ParsingError::invalid_taxa_block(&self.byte_parser, String::from("Expected 'NTAX' in TAXA block.")))
    }

    /// Parses the labels of `TAXLABELS <label> ...;`.
    fn parse_taxa_block_labels(&mut self) -> Result<Vec<String>, ParsingError> {
        let mut labels = Vec::new();
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;
            if self.byte_parser.consume_if(b';') {
                return Ok(labels);
            }
            let label = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;
            if label.is_empty() {
                return match self.byte_parser.peek() {
                    None => Err(ParsingError::unexpected_eof(&self.byte_parser)),
                    Some(b) => Err(ParsingError::invalid_taxa_block(
                        &self.byte_parser,
                        format!("Unexpected char '{}' in TAXLABELS.", b as char),
                    )),
                };
            }
            labels.push(label);
        }
    }

    /// Parses the `TRANSLATE` command if the TREES block starts with one.
    ///
    /// # Returns
    /// `(key, label)` pairs in file order, or `None` without a TRANSLATE command
    fn parse_translate(&mut self) -> Result<Option<Vec<(String, String)>>, ParsingError> {
        self.byte_parser.skip_comment_and_whitespace()?;
        if !self.byte_parser.consume_if_sequence(TRANSLATE) {
            return Ok(None);
        }

        let mut pairs = Vec::new();
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;
            if self.byte_parser.consume_if(b';') {
                break;
            }
            let key = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;
            let label = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;
            if key.is_empty() || label.is_empty() {
                return Err(ParsingError::invalid_trees_block(
                    &self.byte_parser,
                    String::from("Expected '<key> <label>' pair in TRANSLATE."),
                ));
            }
            pairs.push((key, label));

            self.byte_parser.skip_comment_and_whitespace()?;
            if self.byte_parser.consume_if(b',') {
                continue;
            }
            if self.byte_parser.consume_if(b';') {
                break;
            }
            return match self.byte_parser.peek() {
                None => Err(ParsingError::unexpected_eof(&self.byte_parser)),
                Some(b) => Err(ParsingError::invalid_trees_block(
                    &self.byte_parser,
                    format!("Unexpected char '{}' in TRANSLATE.", b as char),
                )),
            };
        }
        Ok(Some(pairs))
    }

    /// Parses `tree <name> =` of the next tree command, skipping other commands.
    ///
    /// # Returns
    /// The tree name, or `None` at the end of the TREES block
    fn parse_tree_command_head(&mut self) -> Result<Option<String>, ParsingError> {
        loop {
            self.byte_parser.skip_comment_and_whitespace()?;
            if self.peek_is_block_end() || self.byte_parser.is_eof() {
                return Ok(None);
            }
            if self.byte_parser.consume_if_sequence(TREE) {
                break;
            }
            if !self.byte_parser.consume_statement() {
                return Err(ParsingError::unexpected_eof(&self.byte_parser));
            }
        }

        // "TREE * name" marks a default tree
        self.byte_parser.skip_comment_and_whitespace()?;
        self.byte_parser.consume_if(b'*');
        let name = self.byte_parser.parse_label(NEXUS_LABEL_DELIMITERS)?;

        self.byte_parser.skip_comment_and_whitespace()?;
        if !self.byte_parser.consume_if(b'=') {
            return Err(ParsingError::invalid_trees_block(
                &self.byte_parser,
                String::from("Expected '=' after tree name in tree command."),
            ));
        }
        Ok(Some(name))
    }

    /// Consumes a complete tree command without parsing its Newick string.
    fn scan_tree_command(&mut self) -> Result<Option<String>, ParsingError> {
        let Some(name) = self.parse_tree_command_head()? else {
            return Ok(None);
        };
        if !self.byte_parser.consume_statement() {
            return Err(ParsingError::unexpected_eof(&self.byte_parser));
        }
        Ok(Some(name))
    }
}

use crate::model::{AnnotationValue, LabelResolver, TaxonSet, Tree, VertexIndex};
use crate::newick::defs::{
    ANNOTATION_KEY_DELIMITERS, ANNOTATION_VALUE_DELIMITERS, DEFAULT_NUM_LEAVES_GUESS,
    NEWICK_LABEL_DELIMITERS,
};
use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::ByteSource;
use crate::parser::parsing_error::ParsingError;

// =#========================================================================#=
// NEWICK PARSER
// =#========================================================================#=
/// Parser (configuration) for Newick strings of rooted phylogenetic [Tree]s.
///
/// All trees parsed by one `NewickParser` share its [TaxonSet]; leaf labels
/// are turned into taxa by the configured [LabelResolver]. A Nexus reader
/// with a `TRANSLATE` command provides a translating resolver.
///
/// # Configuration
/// * `with_num_leaves(num_leaves)` - Expected number of leaves, used for
///   pre-allocation; otherwise inferred from the first parsed tree
/// * `with_taxa(taxa)` - Resolve against a fixed taxon set; unknown labels
///   are an error
/// * `with_resolver(resolver)` - Replace the resolver
///
/// # Format
/// * `tree ::= vertex ';'`
/// * `vertex ::= leaf | internal_vertex`
/// * `internal_vertex ::= '(' vertex { ',' vertex } ')' [label] suffix`
/// * `leaf ::= label suffix`
/// * `suffix ::= { annotation | ':' number }`
/// * `annotation ::= '[&' key ['=' value] { ',' key ['=' value] } ']'`
/// * `value ::= number | 'true' | 'false' | string | '{' value { ',' value } '}'`
///
/// Furthermore:
/// * Whitespace and `[...]` comments may occur between elements
/// * Internal vertices may have any number of children
/// * Labels of internal vertices are skipped
/// * Vertex heights are derived from branch lengths, the deepest leaf at 0
///
/// # Example
/// ```
/// use cladewick::newick::NewickParser;
/// use cladewick::model::AnnotationValue;
///
/// let mut parser = NewickParser::new();
/// let tree = parser
///     .parse_str("((Kea[&rate=0.5]:1.0,Kaka:1.0):0.5,Kakapo:1.5);")
///     .unwrap();
///
/// assert_eq!(tree.num_leaves(), 3);
/// assert_eq!(tree.height(tree.root_index()), 1.5);
/// let kea = parser.taxa().index_of("Kea").unwrap();
/// let leaf = tree.vertices().iter().find(|v| v.taxon() == Some(kea)).unwrap();
/// assert_eq!(tree.attribute(leaf.index(), "rate"), Some(&AnnotationValue::Float(0.5)));
/// ```
#[derive(Debug, Clone)]
pub struct NewickParser {
    know_num_leaves: bool,
    num_leaves: usize,
    taxa: TaxonSet,
    resolver: LabelResolver,
}

/// A tree under construction plus the branch lengths read so far.
struct PartialTree {
    tree: Tree,
    branch_lengths: Vec<Option<f64>>,
}

impl PartialTree {
    fn register(&mut self, index: VertexIndex) {
        if self.branch_lengths.len() <= index {
            self.branch_lengths.resize(index + 1, None);
        }
    }
}

impl Default for NewickParser {
    fn default() -> Self {
        Self::new()
    }
}

impl NewickParser {
    /// Creates a parser with an empty taxon set that grows with every new
    /// label encountered.
    pub fn new() -> Self {
        Self {
            know_num_leaves: false,
            num_leaves: DEFAULT_NUM_LEAVES_GUESS,
            taxa: TaxonSet::new(),
            resolver: LabelResolver::growing(),
        }
    }

    /// Creates a parser that resolves labels against the given taxa only.
    pub fn with_taxa(taxa: TaxonSet) -> Self {
        Self {
            know_num_leaves: true,
            num_leaves: taxa.len(),
            taxa,
            resolver: LabelResolver::strict(),
        }
    }

    /// Sets the expected number of leaves in the trees.
    pub fn with_num_leaves(mut self, num_leaves: usize) -> Self {
        self.num_leaves = num_leaves;
        self.know_num_leaves = true;
        self
    }

    /// Sets the [LabelResolver] for turning labels into taxa.
    pub fn with_resolver(mut self, resolver: LabelResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub(crate) fn set_resolver(&mut self, resolver: LabelResolver) {
        self.resolver = resolver;
    }

    /// The taxa seen or provided so far.
    pub fn taxa(&self) -> &TaxonSet {
        &self.taxa
    }

    pub(crate) fn taxa_mut(&mut self) -> &mut TaxonSet {
        &mut self.taxa
    }

    /// Consumes the parser and returns the shared taxon set.
    pub fn into_taxa(self) -> TaxonSet {
        self.taxa
    }

    /// Parses a single Newick string.
    pub fn parse_str(&mut self, newick: &str) -> Result<Tree, ParsingError> {
        let mut parser = ByteParser::for_str(newick);
        self.parse(&mut parser)
    }

    /// Parses all trees until EOF.
    pub fn parse_all<S: ByteSource>(&mut self, parser: &mut ByteParser<S>) -> Result<Vec<Tree>, ParsingError> {
        let mut trees = Vec::new();
        loop {
            parser.skip_comment_and_whitespace()?;
            if parser.is_eof() {
                break;
            }
            trees.push(self.parse(parser)?);
        }
        Ok(trees)
    }

    /// Parses a single Newick tree from the given [ByteParser], which is
    /// left right behind the terminating `;`.
    ///
    /// # Errors
    /// Returns a [ParsingError] if the Newick string is malformed, a label
    /// cannot be resolved, or a taxon occurs twice.
    pub fn parse<S: ByteSource>(&mut self, parser: &mut ByteParser<S>) -> Result<Tree, ParsingError> {
        let mut partial = PartialTree {
            tree: Tree::with_capacity(self.num_leaves),
            branch_lengths: Vec::with_capacity(2 * self.num_leaves),
        };

        parser.skip_comment_and_whitespace()?;
        let root = self.parse_vertex(parser, &mut partial)?;

        parser.skip_comment_and_whitespace()?;
        if !parser.consume_if(b';') {
            return Err(ParsingError::invalid_newick_string(
                parser,
                format!("Expected ';' at end of tree but found {:?}", parser.peek().map(|b| b as char)),
            ));
        }

        let PartialTree { mut tree, branch_lengths } = partial;
        tree.set_root(root);
        tree.set_heights_from_branch_lengths(&branch_lengths);
        self.check_unique_taxa(parser, &tree)?;

        if !self.know_num_leaves {
            self.num_leaves = tree.num_leaves();
            self.know_num_leaves = true;
        }
        Ok(tree)
    }

    /// Parses a vertex (either internal vertex or leaf) and returns its index:
    /// - Skips leading whitespace and plain comments
    /// - Dispatches to `parse_internal_vertex` if starts with `(`, otherwise `parse_leaf`
    fn parse_vertex<S: ByteSource>(&mut self, parser: &mut ByteParser<S>, partial: &mut PartialTree) -> Result<VertexIndex, ParsingError> {
        parser.skip_plain_comments_and_whitespace()?;
        let index = if parser.peek_is(b'(') {
            self.parse_internal_vertex(parser, partial)?
        } else {
            self.parse_leaf(parser, partial)?
        };
        self.parse_suffix(parser, partial, index)?;
        Ok(index)
    }

    /// Parses `(child, child, ...)[label]` and adds the internal vertex.
    fn parse_internal_vertex<S: ByteSource>(&mut self, parser: &mut ByteParser<S>, partial: &mut PartialTree) -> Result<VertexIndex, ParsingError> {
        parser.next_byte();

        let mut children: Vec<VertexIndex> = Vec::with_capacity(2);
        loop {
            children.push(self.parse_vertex(parser, partial)?);
            parser.skip_plain_comments_and_whitespace()?;
            if parser.consume_if(b',') {
                continue;
            }
            if parser.consume_if(b')') {
                break;
            }
            return Err(ParsingError::invalid_newick_string(
                parser,
                format!("Expected ',' or ')' after child but found {:?}", parser.peek().map(|b| b as char)),
            ));
        }

        // Labels of internal vertices carry no taxon
        parser.skip_plain_comments_and_whitespace()?;
        if parser
            .peek()
            .is_some_and(|b| !NEWICK_LABEL_DELIMITERS.contains(&b))
        {
            parser.parse_label(NEWICK_LABEL_DELIMITERS)?;
        }

        let index = partial.tree.add_internal(&children, 0.0);
        partial.register(index);
        Ok(index)
    }

    /// Parses a leaf label, resolves it and adds the leaf.
    fn parse_leaf<S: ByteSource>(&mut self, parser: &mut ByteParser<S>, partial: &mut PartialTree) -> Result<VertexIndex, ParsingError> {
        let label = parser.parse_label(NEWICK_LABEL_DELIMITERS)?;
        if label.is_empty() {
            return match parser.peek() {
                None => Err(ParsingError::unexpected_eof(parser)),
                Some(b) => Err(ParsingError::invalid_newick_string(
                    parser,
                    format!("Expected leaf label but found {:?}", b as char),
                )),
            };
        }
        let taxon = self
            .resolver
            .resolve(&label, &mut self.taxa)
            .map_err(|label| ParsingError::unresolved_label(parser, format!("Unknown taxon '{label}'")))?;

        let index = partial.tree.add_leaf(taxon, 0.0);
        partial.register(index);
        Ok(index)
    }

    /// Parses any sequence of `[&...]` annotations and at most one branch length.
    fn parse_suffix<S: ByteSource>(&mut self, parser: &mut ByteParser<S>, partial: &mut PartialTree, index: VertexIndex) -> Result<(), ParsingError> {
        let mut seen_branch_length = false;
        loop {
            parser.skip_plain_comments_and_whitespace()?;
            if parser.peek_is_sequence(b"[&") {
                parse_annotation(parser, &mut partial.tree, index)?;
            } else if !seen_branch_length && parser.consume_if(b':') {
                partial.branch_lengths[index] = Some(parse_branch_length(parser)?);
                seen_branch_length = true;
            } else {
                return Ok(());
            }
        }
    }

    fn check_unique_taxa<S: ByteSource>(&self, parser: &ByteParser<S>, tree: &Tree) -> Result<(), ParsingError> {
        let mut seen = vec![false; self.taxa.len()];
        for taxon in tree.vertices().iter().filter_map(|v| v.taxon()) {
            if std::mem::replace(&mut seen[taxon], true) {
                let label = self.taxa.label(taxon).unwrap_or_default();
                return Err(ParsingError::invalid_newick_string(
                    parser,
                    format!("Taxon '{label}' occurs more than once"),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Branch lengths and annotations
// ============================================================================
/// Parses the number following `:`.
fn parse_branch_length<S: ByteSource>(parser: &mut ByteParser<S>) -> Result<f64, ParsingError> {
    parser.skip_plain_comments_and_whitespace()?;
    let number = parser.parse_number_str();
    number
        .parse()
        .map_err(|_| ParsingError::invalid_newick_string(parser, format!("Invalid branch length: '{number}'")))
}

/// Parses `[&key=value,...]` and attaches the pairs to the vertex.
///
/// Keys without a value (such as `[&R]`) are skipped.
fn parse_annotation<S: ByteSource>(parser: &mut ByteParser<S>, tree: &mut Tree, index: VertexIndex) -> Result<(), ParsingError> {
    parser.consume_if_sequence(b"[&");
    loop {
        parser.skip_whitespace();
        if parser.consume_if(b']') {
            return Ok(());
        }
        let key = parser.parse_label(ANNOTATION_KEY_DELIMITERS)?;
        if key.is_empty() {
            return Err(ParsingError::invalid_annotation(
                parser,
                format!("Expected key but found {:?}", parser.peek().map(|b| b as char)),
            ));
        }

        parser.skip_whitespace();
        if parser.consume_if(b'=') {
            let value = parse_annotation_value(parser)?;
            tree.set_attribute(index, key.clone(), value);
            parser.skip_whitespace();
        }

        if parser.consume_if(b',') {
            continue;
        }
        if parser.consume_if(b']') {
            return Ok(());
        }
        return match parser.peek() {
            None => Err(ParsingError::unexpected_eof(parser)),
            Some(b) => Err(ParsingError::invalid_annotation(
                parser,
                format!("Expected ',' or ']' after value of '{}' but found {:?}", key, b as char),
            )),
        };
    }
}

/// Parses a scalar, quoted string or `{...}` list.
fn parse_annotation_value<S: ByteSource>(parser: &mut ByteParser<S>) -> Result<AnnotationValue, ParsingError> {
    parser.skip_whitespace();
    match parser.peek() {
        Some(b'{') => {
            parser.next_byte();
            let mut values = Vec::new();
            loop {
                parser.skip_whitespace();
                if parser.consume_if(b'}') {
                    return Ok(AnnotationValue::Array(values));
                }
                values.push(parse_annotation_value(parser)?);
                parser.skip_whitespace();
                if parser.consume_if(b',') {
                    continue;
                }
                if !parser.peek_is(b'}') {
                    return Err(ParsingError::invalid_annotation(
                        parser,
                        format!("Expected ',' or '}}' in list but found {:?}", parser.peek().map(|b| b as char)),
                    ));
                }
            }
        }
        Some(quote @ (b'"' | b'\'')) => Ok(AnnotationValue::String(parser.parse_quoted_label(quote)?)),
        Some(_) => {
            let token = parser.parse_unquoted_label(ANNOTATION_VALUE_DELIMITERS);
            if token.is_empty() {
                return Err(ParsingError::invalid_annotation(parser, "Missing value".to_string()));
            }
            Ok(interpret_scalar(token))
        }
        None => Err(ParsingError::unexpected_eof(parser)),
    }
}

/// Integer, float, boolean, or else the verbatim string.
fn interpret_scalar(token: String) -> AnnotationValue {
    if let Ok(value) = token.parse::<i64>() {
        return AnnotationValue::Int(value);
    }
    if let Ok(value) = token.parse::<f64>() {
        return AnnotationValue::Float(value);
    }
    if token.eq_ignore_ascii_case("true") {
        AnnotationValue::Bool(true)
    } else if token.eq_ignore_ascii_case("false") {
        AnnotationValue::Bool(false)
    } else {
        AnnotationValue::String(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_scalar() {
        assert_eq!(interpret_scalar("3".to_string()), AnnotationValue::Int(3));
        assert_eq!(interpret_scalar("-0.25".to_string()), AnnotationValue::Float(-0.25));
        assert_eq!(interpret_scalar("1E-3".to_string()), AnnotationValue::Float(0.001));
        assert_eq!(interpret_scalar("TRUE".to_string()), AnnotationValue::Bool(true));
        assert_eq!(
            interpret_scalar("Fiordland".to_string()),
            AnnotationValue::String("Fiordland".to_string())
        );
    }

    #[test]
    fn test_parse_nested_annotation() {
        let mut parser = NewickParser::new();
        let tree = parser
            .parse_str("(Takahe[&loc={{1,2},{3.5,4}},region=\"South Island\",flag]:2,Pukeko:2);")
            .unwrap();
        let takahe = parser.taxa().index_of("Takahe").unwrap();
        let leaf = tree.vertices().iter().position(|v| v.taxon() == Some(takahe)).unwrap();

        let loc = tree.attribute(leaf, "loc").unwrap();
        let AnnotationValue::Array(rows) = loc else {
            panic!("expected array, got {loc:?}");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].as_f64_array(), Some(vec![3.5, 4.0]));
        assert_eq!(
            tree.attribute(leaf, "region"),
            Some(&AnnotationValue::String("South Island".to_string()))
        );
        assert_eq!(tree.attribute(leaf, "flag"), None);
    }

    #[test]
    fn test_annotation_after_branch_length() {
        let mut parser = NewickParser::new();
        let tree = parser.parse_str("((Weka:1[&rate=2],Takahe:1):1[&rate=3],Pukeko:2);").unwrap();
        let internal = tree
            .vertices()
            .iter()
            .find(|v| v.is_internal() && !v.is_root())
            .unwrap()
            .index();
        assert_eq!(tree.attribute(internal, "rate"), Some(&AnnotationValue::Int(3)));
        assert_eq!(tree.height(internal), 1.0);
    }

    #[test]
    fn test_unclosed_annotation() {
        let mut parser = NewickParser::new();
        assert!(parser.parse_str("(Weka[&rate=2,Takahe);").is_err());
    }
}

//! NEXUS format writer for annotated trees.

use crate::model::{TaxonSet, Tree};
use crate::newick::writer::{NewickStyle, estimate_newick_len, to_newick_with_capacity};
use crate::nexus::defs::{
    BLOCK_BEGIN, BLOCK_END, DIMENSIONS, NEXUS_HEADER, NTAX, ROOTED, TAXA, TAXLABELS, TRANSLATE,
    TREE, TREES,
};
use crate::parser::utils::escape_label;
use std::io;
use std::io::{BufWriter, Write};

// =#========================================================================#=
// NEXUS WRITER
// =#========================================================================#=
/// Writer for phylogenetic trees with a shared [TaxonSet] in NEXUS format.
///
/// # Format Structure
/// - `#NEXUS` header
/// - `TAXA` block with dimensions and tax labels
/// - `TREES` block with TRANSLATE command (1-based keys) and one
///   `tree <name> = [&R] <Newick>;` command per tree, vertex annotations
///   included as `[&key=value,...]`
///
/// Trees without a name are called `TREE1`, `TREE2`, ...
///
/// # Example
/// ```
/// use cladewick::model::{TaxonSet, Tree};
/// use cladewick::nexus::NexusWriter;
///
/// let taxa = TaxonSet::from_labels(["Kea", "Kaka"]);
/// let mut tree = Tree::new();
/// let kea = tree.add_leaf(0, 0.0);
/// let kaka = tree.add_leaf(1, 0.0);
/// let root = tree.add_internal(&[kea, kaka], 2.0);
/// tree.set_root(root);
/// tree.set_attribute(root, "posterior", 1.0);
///
/// let mut out = Vec::new();
/// NexusWriter::new(&mut out).write_nexus(&[tree], &taxa).unwrap();
/// let nexus = String::from_utf8(out).unwrap();
/// assert!(nexus.contains("tree TREE1 = [&R] (1:2.0,2:2.0)[&posterior=1.0];"));
/// ```
pub struct NexusWriter<W: Write> {
    bw: BufWriter<W>,
}

// ============================================================================
// API (public)
// ============================================================================
impl<W: Write> NexusWriter<W> {
    /// Creates a new NEXUS writer on top of the given writer.
    pub fn new(writer: W) -> NexusWriter<W> {
        NexusWriter {
            bw: BufWriter::new(writer),
        }
    }

    /// Writes a complete NEXUS document with the trees and their taxa.
    ///
    /// # Errors
    /// Returns an I/O error if writing fails
    pub fn write_nexus(&mut self, trees: &[Tree], taxa: &TaxonSet) -> io::Result<()> {
        self.header()?
            .taxa_block(taxa)?
            .trees_block(trees, taxa)?;
        self.bw.flush()
    }
}

// ============================================================================
// Nexus Block & Command Writing (private)
// ============================================================================
impl<W: Write> NexusWriter<W> {
    /// Writes the NEXUS file header ("#NEXUS"), returning itself for chaining.
    fn header(&mut self) -> io::Result<&mut Self> {
        self.write_all(NEXUS_HEADER)?.newline()?.newline()?;
        Ok(self)
    }

    /// Writes the TAXA block with dimensions and taxon labels, returning itself for chaining.
    fn taxa_block(&mut self, taxa: &TaxonSet) -> io::Result<&mut Self> {
        // "Begin taxa;"
        self.write_all(BLOCK_BEGIN)?
            .space()?
            .write_all(TAXA)?
            .semicolon_ln()?;

        // "\tDimensions ntax=n;"
        self.tab()?
            .write_all(DIMENSIONS)?
            .space()?
            .write_all(NTAX)?
            .equals()?
            .write_all(taxa.len().to_string().as_bytes())?
            .semicolon_ln()?;

        // "\tTaxlabels\n\t\tlabel\n...\t\t;"
        self.tab()?.write_all(TAXLABELS)?.newline()?;
        for label in taxa.labels() {
            self.tab()?.tab()?.write_all(escape_label(label).as_bytes())?.newline()?;
        }
        self.tab()?.tab()?.semicolon_ln()?;

        // "End;"
        self.write_all(BLOCK_END)?.newline()?.newline()?;
        Ok(self)
    }

    /// Writes the TREES block with TRANSLATE command and tree list, returning itself for chaining.
    fn trees_block(&mut self, trees: &[Tree], taxa: &TaxonSet) -> io::Result<&mut Self> {
        // "Begin trees;"
        self.write_all(BLOCK_BEGIN)?
            .space()?
            .write_all(TREES)?
            .semicolon_ln()?;

        self.translate_cmd(taxa)?.trees_cmd_list(trees, taxa)?;

        // "End;"
        self.write_all(BLOCK_END)?.newline()?;
        Ok(self)
    }

    /// Writes the TRANSLATE command mapping 1-based indices to labels, returning itself for chaining.
    fn translate_cmd(&mut self, taxa: &TaxonSet) -> io::Result<&mut Self> {
        self.tab()?.write_all(TRANSLATE)?.newline()?;

        let num_labels = taxa.len();
        for (id, label) in taxa.labels().iter().enumerate() {
            // "\t\t(id + 1) escaped_label,\n"
            self.tab()?
                .tab()?
                .write_all((id + 1).to_string().as_bytes())?
                .space()?
                .write_all(escape_label(label).as_bytes())?;

            // No comma after last pair
            if id + 1 < num_labels {
                self.comma()?;
            }
            self.newline()?;
        }
        self.tab()?.semicolon_ln()?;
        Ok(self)
    }

    /// Writes the list of TREE commands in annotated Newick format, returning itself for chaining.
    fn trees_cmd_list(&mut self, trees: &[Tree], taxa: &TaxonSet) -> io::Result<&mut Self> {
        let Some(some_tree) = trees.first() else {
            return Ok(self);
        };
        let estimated_length = estimate_newick_len(NewickStyle::OneIndexed, some_tree, taxa, true);

        // "tree <name> = [&R] <Newick;>"
        for (i, tree) in trees.iter().enumerate() {
            let name = tree
                .name()
                .map(escape_label)
                .unwrap_or_else(|| format!("TREE{}", i + 1));
            let newick = to_newick_with_capacity(NewickStyle::OneIndexed, tree, taxa, true, estimated_length);

            self.tab()?
                .write_all(TREE)?
                .space()?
                .write_all(name.as_bytes())?
                .space()?
                .equals()?
                .space()?
                .write_all(ROOTED)?
                .space()?
                .write_all(newick.as_bytes())?
                .newline()?;
        }
        Ok(self)
    }
}

// ============================================================================
// Little Helpers (private)
// ============================================================================
impl<W: Write> NexusWriter<W> {
    /// Appends a byte slice to the [BufWriter], returning itself for chaining.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<&mut Self> {
        self.bw.write_all(buf)?;
        Ok(self)
    }

    fn space(&mut self) -> io::Result<&mut Self> {
        self.write_all(b" ")
    }

    fn tab(&mut self) -> io::Result<&mut Self> {
        self.write_all(b"\t")
    }

    fn newline(&mut self) -> io::Result<&mut Self> {
        self.write_all(b"\n")
    }

    /// Appends a semicolon followed by a newline (';\n'), returning itself for chaining.
    fn semicolon_ln(&mut self) -> io::Result<&mut Self> {
        self.write_all(b";\n")
    }

    fn comma(&mut self) -> io::Result<&mut Self> {
        self.write_all(b",")
    }

    fn equals(&mut self) -> io::Result<&mut Self> {
        self.write_all(b"=")
    }
}

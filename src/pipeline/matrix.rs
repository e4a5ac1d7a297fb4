use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::core::layout::OutputLayout;
use crate::utils::atomic::{is_committed, write_atomic};
use crate::{KmatrixError, Result};

/// Square count matrix; `counts[row][col]` is query `row` against index `col`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityMatrix {
    names: Vec<String>,
    counts: Vec<Vec<u64>>,
}

impl SimilarityMatrix {
    /// Zero matrix over `names`, which are sorted and deduplicated
    pub fn new<I: IntoIterator<Item = String>>(names: I) -> Self {
        let names: Vec<String> = names.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let n = names.len();
        Self {
            names,
            counts: vec![vec![0; n]; n],
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    pub fn get(&self, query: &str, index: &str) -> Option<u64> {
        let row = self.position(query)?;
        let col = self.position(index)?;
        Some(self.counts[row][col])
    }

    pub fn set(&mut self, query: &str, index: &str, count: u64) -> bool {
        match (self.position(query), self.position(index)) {
            (Some(row), Some(col)) => {
                self.counts[row][col] = count;
                true
            }
            _ => false,
        }
    }

    pub fn write_tsv<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        for name in &self.names {
            write!(writer, "\t{}", name)?;
        }
        writeln!(writer)?;
        for (name, row) in self.names.iter().zip(&self.counts) {
            write!(writer, "{}", name)?;
            for count in row {
                write!(writer, "\t{}", count)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn parse_tsv(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| KmatrixError::Parse("empty matrix file".to_string()))?;
        let columns: Vec<&str> = header.split('\t').skip(1).collect();

        let mut matrix = Self::new(columns.iter().map(|c| c.to_string()));
        if matrix.len() != columns.len() {
            return Err(KmatrixError::Parse("duplicate matrix column names".to_string()));
        }

        for (i, line) in lines.filter(|l| !l.is_empty()).enumerate() {
            let mut fields = line.split('\t');
            let row = fields.next().unwrap_or_default();
            let values: Vec<&str> = fields.collect();
            if values.len() != columns.len() {
                return Err(KmatrixError::Parse(format!(
                    "matrix row {} has {} values, expected {}",
                    i + 1,
                    values.len(),
                    columns.len()
                )));
            }
            for (column, value) in columns.iter().zip(values) {
                let count = value.parse::<u64>().map_err(|_| {
                    KmatrixError::Parse(format!("matrix row {}: bad count {:?}", i + 1, value))
                })?;
                if !matrix.set(row, column, count) {
                    return Err(KmatrixError::Parse(format!(
                        "matrix row {:?} is not a column name",
                        row
                    )));
                }
            }
        }
        Ok(matrix)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse_tsv(&fs::read_to_string(path)?)
    }
}

/// Read one summary tally; anything unreadable counts as zero
fn read_tally(path: &Path) -> u64 {
    match fs::read_to_string(path) {
        Ok(text) => match text.trim().parse::<u64>() {
            Ok(count) => count,
            Err(_) => {
                tracing::debug!("Unparseable summary {}, using 0", path.display());
                0
            }
        },
        Err(e) => {
            tracing::debug!("No summary at {} ({}), using 0", path.display(), e);
            0
        }
    }
}

fn is_visible(name: &str) -> bool {
    !name.starts_with('.')
}

fn visible_entries(dir: &Path, dirs: bool) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !dir.is_dir() {
        return Ok(names);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if is_visible(&name) && entry.file_type()?.is_dir() == dirs {
            names.push(name);
        }
    }
    Ok(names)
}

pub struct MatrixAssembler<'a> {
    layout: &'a OutputLayout,
}

impl<'a> MatrixAssembler<'a> {
    pub fn new(layout: &'a OutputLayout) -> Self {
        Self { layout }
    }

    /// Selected names plus every name appearing in the summary tree
    pub fn collect_names(&self, samples: &[String]) -> Result<Vec<String>> {
        let mut names: BTreeSet<String> = samples.iter().cloned().collect();
        let mode_dir = self.layout.mode_dir();
        for index in visible_entries(&mode_dir, true)? {
            for query in visible_entries(&mode_dir.join(&index), false)? {
                names.insert(query);
            }
            names.insert(index);
        }
        Ok(names.into_iter().collect())
    }

    /// Assemble and write the matrix; `bool` is false when an existing
    /// matrix file was loaded instead
    pub fn run(&self, samples: &[String]) -> Result<(SimilarityMatrix, bool)> {
        let path = self.layout.matrix_file();
        if is_committed(&path) {
            tracing::info!("Matrix {} already exists, skipping", path.display());
            return Ok((SimilarityMatrix::load(&path)?, false));
        }

        let names = self.collect_names(samples)?;
        let mut matrix = SimilarityMatrix::new(names.clone());
        for query in &names {
            for index in &names {
                let count = read_tally(&self.layout.mode_file(index, query));
                matrix.set(query, index, count);
            }
        }

        write_atomic(&path, |w| matrix.write_tsv(w))?;
        tracing::info!("Wrote {}x{} matrix to {}", matrix.len(), matrix.len(), path.display());
        Ok((matrix, true))
    }
}

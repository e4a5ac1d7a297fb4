use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::bio::fasta::open_fasta;
use crate::bio::sequence::Sequence;
use crate::tools::traits::{IndexParams, KmerEngine};
use crate::utils::atomic::pending_path;
use crate::{KmatrixError, Result};

/// `jellyfish query -s` only reports mers made of A, C, G and T
fn is_reported(kmer: &[u8]) -> bool {
    kmer.iter().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T'))
}

/// Rebuild one result line per k-mer from jellyfish's query output. k-mers
/// jellyfish skips get a `KMER -` line, which carries no count. Lines left
/// in `raw` after the last k-mer are passed through unchanged.
pub fn align_query_output<K, R, W>(kmers: K, raw: R, output: &mut W) -> Result<()>
where
    K: IntoIterator<Item = Result<Sequence>>,
    R: BufRead,
    W: Write,
{
    let mut raw = raw.lines();
    for record in kmers {
        let record = record?;
        if is_reported(&record.sequence) {
            match raw.next() {
                Some(line) => writeln!(output, "{}", line?)?,
                // short output stays short
                None => return Ok(()),
            }
        } else {
            output.write_all(&record.sequence)?;
            output.write_all(b" -\n")?;
        }
    }
    for line in raw {
        writeln!(output, "{}", line?)?;
    }
    Ok(())
}

/// Jellyfish integration
pub struct JellyfishEngine {
    binary_path: PathBuf,
}

impl JellyfishEngine {
    pub fn new<P: Into<PathBuf>>(binary_path: P) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    fn count_args(fasta: &Path, index: &Path, params: &IndexParams) -> Vec<OsString> {
        vec![
            "count".into(),
            "-m".into(),
            params.kmer_length.to_string().into(),
            "-s".into(),
            params.hash_size.clone().into(),
            "-t".into(),
            params.threads.to_string().into(),
            "-o".into(),
            index.as_os_str().to_owned(),
            fasta.as_os_str().to_owned(),
        ]
    }

    fn query_args(kmers: &Path, index: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "query".into(),
            "-s".into(),
            kmers.as_os_str().to_owned(),
            "-o".into(),
            output.as_os_str().to_owned(),
            index.as_os_str().to_owned(),
        ]
    }

    fn command_line(&self, args: &[OsString]) -> String {
        let mut line = self.binary_path.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run jellyfish to completion; a non-zero exit is fatal
    fn run(&self, args: &[OsString]) -> Result<()> {
        let command = self.command_line(args);
        tracing::debug!("Running: {}", command);

        let output = Command::new(&self.binary_path)
            .args(args)
            .output()
            .map_err(|e| KmatrixError::ExternalProcess {
                command: command.clone(),
                code: None,
                stderr: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(KmatrixError::ExternalProcess {
                command,
                code: output.status.code(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            tracing::debug!("jellyfish stderr: {}", stderr);
        }
        Ok(())
    }
}

impl Default for JellyfishEngine {
    fn default() -> Self {
        Self::new("jellyfish")
    }
}

impl KmerEngine for JellyfishEngine {
    fn name(&self) -> &str {
        "jellyfish"
    }

    fn index_extension(&self) -> &str {
        "jf"
    }

    fn verify_installation(&self) -> Result<()> {
        self.run(&["--version".into()])
    }

    fn build_index(&self, fasta: &Path, index: &Path, params: &IndexParams) -> Result<()> {
        self.run(&Self::count_args(fasta, index, params))
    }

    fn query(&self, kmers: &Path, index: &Path, output: &Path) -> Result<()> {
        let raw = pending_path(output)?;
        self.run(&Self::query_args(kmers, index, &raw))?;

        let mut writer = BufWriter::new(File::create(output)?);
        align_query_output(open_fasta(kmers)?, BufReader::new(File::open(&raw)?), &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::fasta::FastaReader;
    use crate::bio::kmer::KmerWriter;
    use crate::pipeline::CountConsumer;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn aligned(kmers: &[u8], raw: &str) -> String {
        let mut out = Vec::new();
        align_query_output(FastaReader::new(Cursor::new(kmers)), Cursor::new(raw), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn params() -> IndexParams {
        IndexParams {
            kmer_length: 20,
            hash_size: "100M".to_string(),
            threads: 4,
        }
    }

    #[test]
    fn test_count_command_line() {
        let engine = JellyfishEngine::default();
        let args = JellyfishEngine::count_args(
            Path::new("subset/A.fasta"),
            Path::new("index/A.jf"),
            &params(),
        );
        assert_eq!(
            engine.command_line(&args),
            "jellyfish count -m 20 -s 100M -t 4 -o index/A.jf subset/A.fasta"
        );
    }

    #[test]
    fn test_query_command_line() {
        let engine = JellyfishEngine::new("/opt/bin/jellyfish");
        let args = JellyfishEngine::query_args(
            Path::new("kmer/A.kmer"),
            Path::new("index/B.jf"),
            Path::new("/tmp/out"),
        );
        assert_eq!(
            engine.command_line(&args),
            "/opt/bin/jellyfish query -s kmer/A.kmer -o /tmp/out index/B.jf"
        );
    }

    #[test]
    fn test_read_with_n_keeps_one_line_per_kmer() {
        let mut kmers = Vec::new();
        let written = KmerWriter::new(&mut kmers).write_sequence(b"ACGNACGT", 4).unwrap();
        assert_eq!(written, 5);

        // jellyfish only answers for the one k-mer without N
        let text = aligned(&kmers, "ACGT 3\n");
        assert_eq!(text, "ACGN -\nCGNA -\nGNAC -\nNACG -\nACGT 3\n");

        let lines = text.lines().map(|l| Ok::<_, std::io::Error>(l.to_string()));
        let mut consumer = CountConsumer::new(lines);
        assert_eq!(consumer.take(written).unwrap(), vec![3]);
        assert_eq!(consumer.remaining().unwrap(), 0);
    }

    #[test]
    fn test_short_output_is_not_padded() {
        let text = aligned(b">0\nACGT\n>1\nCCCC\n>2\nNNNN\n", "ACGT 1\n");
        assert_eq!(text, "ACGT 1\n");
    }

    #[test]
    fn test_extra_output_lines_pass_through() {
        let text = aligned(b">0\nACGT\n", "ACGT 1\nGGGG 2\n");
        assert_eq!(text, "ACGT 1\nGGGG 2\n");
    }

    #[test]
    fn test_missing_binary_is_external_process_error() {
        let engine = JellyfishEngine::new("/nonexistent/kmatrix-test/jellyfish");
        match engine.verify_installation() {
            Err(KmatrixError::ExternalProcess { command, code, .. }) => {
                assert!(command.ends_with("jellyfish --version"));
                assert_eq!(code, None);
            }
            other => panic!("Expected ExternalProcess error, got {:?}", other),
        }
    }
}

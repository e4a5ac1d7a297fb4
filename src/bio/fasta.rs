use crate::bio::sequence::Sequence;
use crate::KmatrixError;
use flate2::read::MultiGzDecoder;
use memmap2::Mmap;
use nom::{
    bytes::complete::{tag, take_till},
    character::complete::{line_ending, not_line_ending},
    combinator::{map, opt},
    sequence::preceded,
    IResult,
};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

/// Extensions recognised as FASTA sample files, optionally followed by `.gz`
pub const FASTA_EXTENSIONS: [&str; 5] = ["fasta", "fa", "fna", "fas", "ffn"];

/// Parse a FASTA header line
fn parse_header(input: &[u8]) -> IResult<&[u8], (&str, Option<&str>)> {
    let (input, _) = tag(b">")(input)?;
    let (input, id) = map(
        take_till(|c: u8| c == b' ' || c == b'\t' || c == b'\n' || c == b'\r'),
        |s| std::str::from_utf8(s).unwrap_or(""),
    )(input)?;
    let (input, description) = opt(preceded(
        take_till(|c: u8| c != b' ' && c != b'\t'),
        map(not_line_ending, |s| std::str::from_utf8(s).unwrap_or("")),
    ))(input)?;
    let (input, _) = opt(line_ending)(input)?;
    let description = description.filter(|d| !d.is_empty());
    Ok((input, (id, description)))
}

/// Parse sequence lines until next header or EOF
fn parse_sequence(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let mut sequence = Vec::new();
    let mut remaining = input;

    while !remaining.is_empty() && remaining[0] != b'>' {
        let (rest, line) =
            take_till::<_, _, nom::error::Error<_>>(|c: u8| c == b'\n' || c == b'\r')(remaining)?;
        let (rest, _) = opt(line_ending)(rest)?;
        // a lone '\r' is not a line ending for nom
        let rest = rest.strip_prefix(b"\r").unwrap_or(rest);

        push_residues(&mut sequence, line);
        remaining = rest;
    }

    Ok((remaining, sequence))
}

fn push_residues(sequence: &mut Vec<u8>, line: &[u8]) {
    for &c in line {
        if !c.is_ascii_whitespace() {
            sequence.push(c.to_ascii_uppercase());
        }
    }
}

/// Parse a single FASTA record
fn parse_record(input: &[u8]) -> IResult<&[u8], Sequence> {
    let (input, (id, description)) = parse_header(input)?;
    let (input, sequence) = parse_sequence(input)?;

    let mut seq = Sequence::new(id.to_string(), sequence);
    if let Some(desc) = description {
        seq = seq.with_description(desc.to_string());
    }
    Ok((input, seq))
}

/// Parse FASTA from bytes. Records with an empty sequence are kept.
pub fn parse_fasta_from_bytes(data: &[u8]) -> Result<Vec<Sequence>, KmatrixError> {
    let mut input = data;
    let mut sequences = Vec::new();

    loop {
        while !input.is_empty() && input[0].is_ascii_whitespace() {
            input = &input[1..];
        }
        if input.is_empty() {
            break;
        }
        if input[0] != b'>' {
            return Err(KmatrixError::Parse(
                "FASTA data must start with a '>' header".to_string(),
            ));
        }

        match parse_record(input) {
            Ok((remaining, seq)) => {
                sequences.push(seq);
                input = remaining;
            }
            Err(e) => {
                return Err(KmatrixError::Parse(format!("Failed to parse FASTA: {:?}", e)));
            }
        }
    }

    Ok(sequences)
}

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("gz")
}

/// Parse a whole FASTA file into memory (supports .gz compression)
pub fn parse_fasta<P: AsRef<Path>>(path: P) -> Result<Vec<Sequence>, KmatrixError> {
    let path = path.as_ref();
    let file = File::open(path)?;

    if is_gzip(path) {
        let mut decoder = MultiGzDecoder::new(BufReader::new(file));
        let mut buffer = Vec::new();
        decoder.read_to_end(&mut buffer)?;
        parse_fasta_from_bytes(&buffer)
    } else {
        if file.metadata()?.len() == 0 {
            return Ok(Vec::new());
        }
        let mmap = unsafe { Mmap::map(&file)? };
        parse_fasta_from_bytes(&mmap[..])
    }
}

/// Streaming FASTA reader yielding one record at a time
pub struct FastaReader<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
    pending_header: Option<(String, Option<String>)>,
    line_number: usize,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            pending_header: None,
            line_number: 0,
        }
    }

    fn read_line(&mut self) -> Result<bool, KmatrixError> {
        self.buffer.clear();
        let n = self.reader.read_until(b'\n', &mut self.buffer)?;
        if n > 0 {
            self.line_number += 1;
        }
        Ok(n > 0)
    }

    fn header_from_buffer(&self) -> Result<(String, Option<String>), KmatrixError> {
        let (_, (id, description)) = parse_header(&self.buffer).map_err(|_| {
            KmatrixError::Parse(format!(
                "Failed to parse FASTA header at line {}",
                self.line_number
            ))
        })?;
        Ok((id.to_string(), description.map(|d| d.to_string())))
    }

    fn next_record(&mut self) -> Result<Option<Sequence>, KmatrixError> {
        let (id, description) = match self.pending_header.take() {
            Some(header) => header,
            None => loop {
                if !self.read_line()? {
                    return Ok(None);
                }
                if self.buffer.iter().all(|c| c.is_ascii_whitespace()) {
                    continue;
                }
                if self.buffer[0] != b'>' {
                    return Err(KmatrixError::Parse(format!(
                        "Expected FASTA header at line {}",
                        self.line_number
                    )));
                }
                break self.header_from_buffer()?;
            },
        };

        let mut sequence = Vec::new();
        while self.read_line()? {
            if self.buffer.first() == Some(&b'>') {
                self.pending_header = Some(self.header_from_buffer()?);
                break;
            }
            push_residues(&mut sequence, &self.buffer);
        }

        let mut seq = Sequence::new(id, sequence);
        if let Some(desc) = description {
            seq = seq.with_description(desc);
        }
        Ok(Some(seq))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<Sequence, KmatrixError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Open a FASTA file for streaming (supports .gz compression)
pub fn open_fasta<P: AsRef<Path>>(path: P) -> Result<FastaReader<Box<dyn BufRead>>, KmatrixError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if is_gzip(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(FastaReader::new(reader))
}

/// Write one record, wrapping the sequence at 80 columns
pub fn write_record<W: Write>(writer: &mut W, seq: &Sequence) -> Result<(), KmatrixError> {
    writeln!(writer, "{}", seq.header())?;
    for chunk in seq.sequence.chunks(80) {
        writer.write_all(chunk)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Split a sample file name into its sample name, or None when the
/// extension is not a FASTA one
pub fn sample_name(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(".gz").unwrap_or(file_name);
    let (name, extension) = stem.rsplit_once('.')?;
    if name.is_empty() {
        return None;
    }
    let extension = extension.to_ascii_lowercase();
    if FASTA_EXTENSIONS.contains(&extension.as_str()) {
        Some(name)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_header() {
        let input = b">read_1 sample A\nACGT";
        let (remaining, (id, desc)) = parse_header(input).unwrap();
        assert_eq!(id, "read_1");
        assert_eq!(desc, Some("sample A"));
        assert_eq!(remaining, b"ACGT");
    }

    #[test]
    fn test_parse_header_without_newline() {
        let (remaining, (id, desc)) = parse_header(b">lonely").unwrap();
        assert_eq!(id, "lonely");
        assert_eq!(desc, None);
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_parse_keeps_empty_records() {
        let seqs = parse_fasta_from_bytes(b">a\nACGT\n>b\n>c\nac\ngt\n").unwrap();
        assert_eq!(seqs.len(), 3);
        assert!(seqs[1].is_empty());
        assert_eq!(seqs[2].sequence, b"ACGT".to_vec());
    }

    #[test]
    fn test_streaming_matches_buffer_parser() {
        let data = b"\n>r1 first\nACGTAC\nGGTT\n>r2\r\nTTTT\r\n>r3\n";
        let buffered = parse_fasta_from_bytes(data).unwrap();
        let streamed: Vec<Sequence> = FastaReader::new(Cursor::new(&data[..]))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(buffered, streamed);
        assert_eq!(streamed[0].sequence, b"ACGTACGGTT".to_vec());
        assert_eq!(streamed[1].sequence, b"TTTT".to_vec());
        assert!(streamed[2].is_empty());
    }

    #[test]
    fn test_streaming_rejects_headerless_data() {
        let mut reader = FastaReader::new(Cursor::new(&b"ACGT\n>r1\nAC\n"[..]));
        assert!(matches!(reader.next(), Some(Err(KmatrixError::Parse(_)))));
    }

    #[test]
    fn test_sample_name() {
        assert_eq!(sample_name("A.fasta"), Some("A"));
        assert_eq!(sample_name("B.fa.gz"), Some("B"));
        assert_eq!(sample_name("gut.v2.FNA"), Some("gut.v2"));
        assert_eq!(sample_name("notes.txt"), None);
        assert_eq!(sample_name("README"), None);
        assert_eq!(sample_name(".fa"), None);
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

use crate::error::{CpvError, Result};
use crate::hasher::CHECKSUM_HEX_LEN;

/// Manifest of the directory as it was before the copy.
pub const SOURCE_MANIFEST_NAME: &str = ".cpv_source_checksums.txt";
/// Manifest of the directory as it is on disk now.
pub const TARGET_MANIFEST_NAME: &str = ".cpv_target_checksums.txt";
/// Entries of the source manifest without an exact match in the target manifest.
pub const DIFF_REPORT_NAME: &str = ".cpv_checksum_diff.txt";

pub const RESERVED_NAMES: [&str; 3] =
    [SOURCE_MANIFEST_NAME, TARGET_MANIFEST_NAME, DIFF_REPORT_NAME];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// How strictly a manifest line is read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineSyntax {
    /// Lines as cpv writes them: one space, then the path verbatim. A line
    /// starting with `\` carries a path with `\\`, `\n` and `\r` escapes.
    #[default]
    Native,
    /// Output of sha256sum, b3sum or TeraCopy: a second space or `*` before
    /// the path is dropped, `\` separators become `/`, a leading `./` is
    /// stripped and the path is NFC-normalized.
    Lenient,
}

/// One `<checksum> <path>` line.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManifestEntry {
    pub checksum: String,
    pub path: String,
}

impl ManifestEntry {
    pub fn new(checksum: impl Into<String>, path: impl Into<String>) -> Self {
        Self { checksum: checksum.into(), path: path.into() }
    }

    /// Parse one line as cpv writes it. Inverse of `Display`.
    pub fn parse_line(line: &str) -> std::result::Result<Self, String> {
        Self::parse_with(line, LineSyntax::Native)
    }

    pub fn parse_with(line: &str, syntax: LineSyntax) -> std::result::Result<Self, String> {
        let (escaped, line) = match line.strip_prefix('\\') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let (checksum, rest) =
            line.split_once(' ').ok_or_else(|| "expected '<checksum> <path>'".to_string())?;
        if checksum.len() != CHECKSUM_HEX_LEN || !checksum.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("checksum must be {CHECKSUM_HEX_LEN} hex digits, got {checksum:?}"));
        }
        let checksum = checksum.to_ascii_lowercase();

        let path = match syntax {
            LineSyntax::Native if escaped => unescape(rest)?,
            LineSyntax::Native => rest.to_string(),
            LineSyntax::Lenient => {
                let rest = rest.trim_end_matches('\r');
                let rest = rest.strip_prefix([' ', '*']).unwrap_or(rest);
                let slashed = if escaped { unescape(rest)? } else { rest.replace('\\', "/") };
                let mut path = slashed.as_str();
                while let Some(stripped) = path.strip_prefix("./") {
                    path = stripped;
                }
                path.nfc().collect()
            }
        };
        if path.is_empty() {
            return Err("empty path".to_string());
        }
        Ok(Self { checksum, path })
    }

    /// The line TeraCopy writes for this entry: `<checksum> *<path>`.
    pub fn teracopy_line(&self) -> String {
        if needs_escape(&self.path) {
            format!("\\{} *{}", self.checksum, escape(&self.path))
        } else {
            format!("{} *{}", self.checksum, self.path)
        }
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if needs_escape(&self.path) {
            write!(f, "\\{} {}", self.checksum, escape(&self.path))
        } else {
            write!(f, "{} {}", self.checksum, self.path)
        }
    }
}

fn needs_escape(path: &str) -> bool {
    path.contains(['\\', '\n', '\r'])
}

fn escape(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 2);
    for c in path.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(path: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => return Err(format!("unknown escape '\\{other}' in path")),
            None => return Err("path ends in a lone '\\'".to_string()),
        }
    }
    Ok(out)
}

/// Entries of a manifest file, in on-disk order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Parse text in cpv's own syntax. Blank lines and `;` comment lines are
    /// skipped. `origin` only labels errors.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        Self::parse_with(text, origin, LineSyntax::Native)
    }

    pub fn parse_with(text: &str, origin: &Path, syntax: LineSyntax) -> Result<Self> {
        let mut entries = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim_start_matches('\u{feff}');
            if line.trim().is_empty() || line.starts_with(';') {
                continue;
            }
            let entry = ManifestEntry::parse_with(line, syntax).map_err(|reason| {
                CpvError::MalformedManifest { path: origin.to_path_buf(), line: i + 1, reason }
            })?;
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    /// Read a manifest file written by cpv; a missing file is `MissingManifest`.
    pub fn read(path: &Path) -> Result<Self> {
        Self::read_with(path, LineSyntax::Native)
    }

    pub fn read_with(path: &Path, syntax: LineSyntax) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CpvError::MissingManifest { path: path.to_path_buf() })
            }
            Err(e) => return Err(CpvError::io(path, e)),
        };
        Self::parse_with(&text, path, syntax)
    }

    pub fn paths(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.path.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write all entries to `path`, replacing whatever was there.
    pub fn write(&self, path: &Path) -> Result<()> {
        let f = File::create(path).map_err(|e| CpvError::io(path, e))?;
        write_entries(f, &self.entries, path)
    }

    /// Write the entries as a TeraCopy checksum file, header included.
    pub fn write_teracopy<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "; Checksums exported by cpv")?;
        writeln!(w, "; teracopy.com")?;
        writeln!(w)?;
        for e in &self.entries {
            writeln!(w, "{}", e.teracopy_line())?;
        }
        w.flush()
    }
}

/// Append `entries` to the manifest at `path` without touching existing lines.
pub fn append_entries(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    let mut f = OpenOptions::new().append(true).open(path).map_err(|e| CpvError::io(path, e))?;
    // Files written by other tools may lack a final newline.
    let len = f.metadata().map_err(|e| CpvError::io(path, e))?.len();
    if len > 0 && !ends_with_newline(path)? {
        f.write_all(b"\n").map_err(|e| CpvError::io(path, e))?;
    }
    write_entries(f, entries, path)
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut f = File::open(path).map_err(|e| CpvError::io(path, e))?;
    let mut last = [0u8; 1];
    f.seek(SeekFrom::End(-1)).map_err(|e| CpvError::io(path, e))?;
    f.read_exact(&mut last).map_err(|e| CpvError::io(path, e))?;
    Ok(last[0] == b'\n')
}

fn write_entries(f: File, entries: &[ManifestEntry], path: &Path) -> Result<()> {
    let mut w = BufWriter::new(f);
    for e in entries {
        writeln!(w, "{e}").map_err(|err| CpvError::io(path, err))?;
    }
    w.flush().map_err(|err| CpvError::io(path, err))
}

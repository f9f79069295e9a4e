//! Persistent page spill. A logical key/value map from `(pid, vpn)` to raw
//! page contents, backed by a single text file.
//!
//! File format (one page per section, unrelated lines preserved verbatim):
//!
//! ```text
//! [PID <pid> VPN <vpn>]
//! <byte 0>
//! ...
//! <byte frame_size-1>
//! [/PID <pid> VPN <vpn>]
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::pid::ProcessId;

/// Persists page contents across frame evictions.
///
/// All operations serialize through the caller's own lock (the
/// `MemoryManager`'s); this trait itself makes no concurrency promises
/// beyond what `&self`/`&mut self` already express.
pub trait BackingStore: Send {
    fn write_page(&mut self, pid: ProcessId, vpn: u32, bytes: &[u8]) -> io::Result<()>;
    fn read_page(&self, pid: ProcessId, vpn: u32) -> io::Result<Option<Vec<u8>>>;
    fn has_page(&self, pid: ProcessId, vpn: u32) -> io::Result<bool> {
        Ok(self.read_page(pid, vpn)?.is_some())
    }
}

fn header(pid: ProcessId, vpn: u32) -> String {
    format!("[PID {} VPN {}]", pid.as_u64(), vpn)
}

fn footer(pid: ProcessId, vpn: u32) -> String {
    format!("[/PID {} VPN {}]", pid.as_u64(), vpn)
}

/// A single text file on disk, matching the wire format above.
pub struct FileBackingStore {
    path: PathBuf,
    frame_size: usize,
}

impl FileBackingStore {
    pub fn new(path: impl Into<PathBuf>, frame_size: usize) -> Self {
        Self {
            path: path.into(),
            frame_size,
        }
    }

    fn read_lines(&self) -> io::Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents.lines().map(str::to_owned).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn write_lines_atomically(&self, lines: &[String]) -> io::Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        let mut body = String::new();
        for line in lines {
            body.push_str(line);
            body.push('\n');
        }
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl BackingStore for FileBackingStore {
    fn write_page(&mut self, pid: ProcessId, vpn: u32, bytes: &[u8]) -> io::Result<()> {
        debug_assert_eq!(bytes.len(), self.frame_size);

        let head = header(pid, vpn);
        let foot = footer(pid, vpn);
        let lines = self.read_lines()?;

        let mut out = Vec::with_capacity(lines.len() + self.frame_size + 2);
        let mut i = 0;
        let mut replaced = false;
        while i < lines.len() {
            if lines[i] == head {
                replaced = true;
                out.push(head.clone());
                for b in bytes {
                    out.push(b.to_string());
                }
                out.push(foot.clone());
                // skip over the old section
                i += 1;
                while i < lines.len() && lines[i] != foot {
                    i += 1;
                }
                if i < lines.len() {
                    i += 1; // skip the footer itself
                }
                continue;
            }
            out.push(lines[i].clone());
            i += 1;
        }

        if !replaced {
            out.push(head);
            for b in bytes {
                out.push(b.to_string());
            }
            out.push(foot);
        }

        self.write_lines_atomically(&out)
    }

    fn read_page(&self, pid: ProcessId, vpn: u32) -> io::Result<Option<Vec<u8>>> {
        let head = header(pid, vpn);
        let foot = footer(pid, vpn);
        let lines = self.read_lines()?;

        let Some(start) = lines.iter().position(|l| *l == head) else {
            return Ok(None);
        };

        let mut bytes = Vec::with_capacity(self.frame_size);
        let mut i = start + 1;
        while i < lines.len() && lines[i] != foot && bytes.len() < self.frame_size {
            let value: u8 = lines[i].trim().parse().map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "backing store byte line malformed")
            })?;
            bytes.push(value);
            i += 1;
        }

        Ok(Some(bytes))
    }
}

/// An in-memory stand-in used by tests that don't need to touch disk.
#[derive(Default)]
pub struct MemoryBackingStore {
    pages: std::collections::HashMap<(ProcessId, u32), Vec<u8>>,
}

impl BackingStore for MemoryBackingStore {
    fn write_page(&mut self, pid: ProcessId, vpn: u32, bytes: &[u8]) -> io::Result<()> {
        self.pages.insert((pid, vpn), bytes.to_vec());
        Ok(())
    }

    fn read_page(&self, pid: ProcessId, vpn: u32) -> io::Result<Option<Vec<u8>>> {
        Ok(self.pages.get(&(pid, vpn)).cloned())
    }
}

// CurseForge package fingerprint: 32-bit MurmurHash2, seed 1, computed over the
// file with tab, LF, CR and space bytes removed.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::core::error::{InstallerError, InstallerResult};

const SEED: u32 = 1;
const M: u32 = 0x5bd1_e995;
const R: u32 = 24;

fn is_stripped(byte: u8) -> bool {
    matches!(byte, 9 | 10 | 13 | 32)
}

/// Incremental MurmurHash2. The total length must be known up front.
struct Murmur2 {
    h: u32,
    tail: [u8; 4],
    tail_len: usize,
}

impl Murmur2 {
    fn new(len: u32) -> Self {
        Self {
            h: SEED ^ len,
            tail: [0; 4],
            tail_len: 0,
        }
    }

    fn push(&mut self, byte: u8) {
        self.tail[self.tail_len] = byte;
        self.tail_len += 1;
        if self.tail_len == 4 {
            let mut k = u32::from_le_bytes(self.tail);
            k = k.wrapping_mul(M);
            k ^= k >> R;
            k = k.wrapping_mul(M);
            self.h = self.h.wrapping_mul(M);
            self.h ^= k;
            self.tail_len = 0;
        }
    }

    fn finish(mut self) -> u32 {
        let t = &self.tail;
        if self.tail_len >= 3 {
            self.h ^= u32::from(t[2]) << 16;
        }
        if self.tail_len >= 2 {
            self.h ^= u32::from(t[1]) << 8;
        }
        if self.tail_len >= 1 {
            self.h ^= u32::from(t[0]);
            self.h = self.h.wrapping_mul(M);
        }
        self.h ^= self.h >> 13;
        self.h = self.h.wrapping_mul(M);
        self.h ^= self.h >> 15;
        self.h
    }
}

pub fn fingerprint_bytes(bytes: &[u8]) -> u32 {
    let retained = bytes.iter().filter(|b| !is_stripped(**b)).count() as u32;
    let mut hasher = Murmur2::new(retained);
    for byte in bytes.iter().copied().filter(|b| !is_stripped(*b)) {
        hasher.push(byte);
    }
    hasher.finish()
}

/// Fingerprint a file in two streaming passes: count retained bytes, then hash.
pub fn fingerprint_file(path: &Path) -> InstallerResult<u32> {
    let mut retained: u32 = 0;
    for_each_byte(path, |byte| {
        if !is_stripped(byte) {
            retained = retained.wrapping_add(1);
        }
    })?;

    let mut hasher = Murmur2::new(retained);
    for_each_byte(path, |byte| {
        if !is_stripped(byte) {
            hasher.push(byte);
        }
    })?;
    Ok(hasher.finish())
}

fn for_each_byte(path: &Path, mut f: impl FnMut(u8)) -> InstallerResult<()> {
    let file = File::open(path).map_err(|e| InstallerError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| InstallerError::io(path, e))?;
        if read == 0 {
            return Ok(());
        }
        buffer[..read].iter().copied().for_each(&mut f);
    }
}

//! Archive fixtures built at test time.

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use arcdupe::archive::{ArchiveWalker, Capabilities, DEFAULT_MAX_RECURSION_DEPTH};
use arcdupe::index::Index;
use arcdupe::scanner::{Hasher, SourceCatalogBuilder, SourceScan, TargetMatcher, TargetScan};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Zip archive bytes holding `files`.
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    fs::write(path, zip_bytes(files)).unwrap();
}

/// Gzip-compressed tar archive bytes holding `files`.
pub fn tar_gz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Bytes that do not compress: a simple linear congruential sequence.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}

/// A source and a target directory under one temp dir.
pub struct Corpus {
    pub dir: TempDir,
}

impl Corpus {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("source")).unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        Self { dir }
    }

    pub fn source(&self) -> PathBuf {
        self.dir.path().join("source")
    }

    pub fn target(&self) -> PathBuf {
        self.dir.path().join("target")
    }

    pub fn source_file(&self, name: &str) -> PathBuf {
        self.source().join(name)
    }

    pub fn write_target(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.target().join(name);
        File::create(&path).unwrap().write_all(data).unwrap();
        path
    }
}

pub fn walker() -> ArchiveWalker {
    ArchiveWalker::new(Capabilities::builtin_only(), DEFAULT_MAX_RECURSION_DEPTH)
}

pub fn scan_sources(index: &Index, corpus: &Corpus, hasher: &Hasher) -> SourceScan {
    SourceCatalogBuilder::new(index, walker(), hasher.clone())
        .scan(&[corpus.source()])
        .unwrap()
}

pub fn scan_targets(index: &Index, corpus: &Corpus, hasher: &Hasher) -> TargetScan {
    TargetMatcher::new(index, hasher.clone())
        .with_auto_select(true)
        .scan(&[corpus.target()])
        .unwrap()
}

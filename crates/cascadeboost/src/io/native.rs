//! Native binary format for trained cascades.
//!
//! # Layout
//!
//! A 24-byte envelope followed by the payload:
//!
//! | Offset | Size | Field                              |
//! |--------|------|------------------------------------|
//! | 0      | 4    | magic `VJCB`                       |
//! | 4      | 1    | major version                      |
//! | 5      | 1    | minor version                      |
//! | 6      | 2    | reserved (zero)                    |
//! | 8      | 4    | feature count (u32)                |
//! | 12     | 4    | payload length (u32)               |
//! | 16     | 4    | CRC32 of the payload               |
//! | 20     | 4    | reserved (zero)                    |
//!
//! The payload is sequential little-endian: the stage count (i32), then per
//! stage its parameters (boost type i32, weight-trim rate f32, max depth i32,
//! weak-tree cap i32, min TAR f32, max FAR f32), its threshold (f32), its tree
//! count (i32) and every tree in pre-order. Each node stores its value (f32)
//! and a has-children byte; internal nodes follow with the feature index (i32)
//! and threshold (f32), then the left and right subtrees.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::model::StageParams;
use crate::repr::{
    BoostedStage, Cascade, CascadeValidationError, MAX_TREE_DEPTH, MutableTree, NodeId, TreeView, WeakTree,
};
use crate::training::BoostType;

// ============================================================================
// Constants
// ============================================================================

pub const MAGIC: [u8; 4] = *b"VJCB";
pub const CURRENT_VERSION_MAJOR: u8 = 1;
pub const CURRENT_VERSION_MINOR: u8 = 0;
pub const HEADER_SIZE: usize = 24;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("cascade is not storable: {0}")]
    InvalidCascade(#[from] CascadeValidationError),

    #[error("{what} {value} does not fit the format")]
    OutOfRange { what: &'static str, value: usize },

    #[error("tree of depth {0} exceeds the stored limit of {max}", max = MAX_TREE_DEPTH)]
    TooDeep(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("bad magic {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("stream ended early")]
    Truncated,

    #[error("payload checksum mismatch: header {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("invalid {what}: {value}")]
    InvalidCount { what: &'static str, value: i32 },

    #[error("unknown boost type code {0}")]
    UnknownBoostType(i32),

    #[error("invalid has-children flag {0}")]
    InvalidFlag(u8),

    #[error("tree deeper than {max} levels", max = MAX_TREE_DEPTH)]
    TooDeep,

    #[error("{0} trailing bytes after the cascade")]
    TrailingBytes(usize),

    #[error("model has {found} features, representation has {expected}")]
    FeatureCountMismatch { expected: usize, found: usize },

    #[error("invalid cascade structure: {0}")]
    InvalidStructure(#[from] CascadeValidationError),

    #[error(transparent)]
    Io(std::io::Error),
}

impl From<std::io::Error> for DeserializeError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::Truncated,
            _ => Self::Io(err),
        }
    }
}

// ============================================================================
// Header
// ============================================================================

/// Fixed-size envelope in front of every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub n_features: u32,
    pub payload_len: u32,
    pub checksum: u32,
}

impl FormatHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4] = self.version_major;
        bytes[5] = self.version_minor;
        bytes[8..12].copy_from_slice(&self.n_features.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Parse and check magic and version.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self, DeserializeError> {
        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != MAGIC {
            return Err(DeserializeError::BadMagic(magic));
        }
        let (major, minor) = (bytes[4], bytes[5]);
        if major != CURRENT_VERSION_MAJOR {
            return Err(DeserializeError::UnsupportedVersion { major, minor });
        }
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Ok(Self {
            version_major: major,
            version_minor: minor,
            n_features: word(8),
            payload_len: word(12),
            checksum: word(16),
        })
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Encoder and decoder for the native format.
pub struct NativeCodec;

impl NativeCodec {
    /// Encode a validated cascade into a complete artifact.
    pub fn encode(cascade: &Cascade) -> Result<Vec<u8>, SerializeError> {
        cascade.validate()?;

        let mut payload = PayloadWriter::default();
        payload.count("stage count", cascade.n_stages())?;
        for stage in cascade.stages() {
            payload.stage(stage)?;
        }
        let payload = payload.bytes;

        let header = FormatHeader {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            n_features: to_u32("feature count", cascade.n_features())?,
            payload_len: to_u32("payload length", payload.len())?,
            checksum: crc32fast::hash(&payload),
        };

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&header.to_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    pub fn write_to<W: Write>(cascade: &Cascade, writer: &mut W) -> Result<(), SerializeError> {
        writer.write_all(&Self::encode(cascade)?)?;
        writer.flush()?;
        Ok(())
    }

    /// Decode an artifact that must end exactly after its payload.
    pub fn decode(bytes: &[u8]) -> Result<Cascade, DeserializeError> {
        let header_bytes: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|head| head.try_into().ok())
            .ok_or(DeserializeError::Truncated)?;
        let header = FormatHeader::from_bytes(header_bytes)?;

        let rest = &bytes[HEADER_SIZE..];
        let payload_len = header.payload_len as usize;
        if rest.len() < payload_len {
            return Err(DeserializeError::Truncated);
        }
        if rest.len() > payload_len {
            return Err(DeserializeError::TrailingBytes(rest.len() - payload_len));
        }
        Self::decode_payload(&header, rest)
    }

    /// Read one artifact from a stream, leaving anything after it unread.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Cascade, DeserializeError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;
        let header = FormatHeader::from_bytes(&header_bytes)?;

        let mut payload = Vec::new();
        reader.take(u64::from(header.payload_len)).read_to_end(&mut payload)?;
        if payload.len() != header.payload_len as usize {
            return Err(DeserializeError::Truncated);
        }
        Self::decode_payload(&header, &payload)
    }

    fn decode_payload(header: &FormatHeader, payload: &[u8]) -> Result<Cascade, DeserializeError> {
        let actual = crc32fast::hash(payload);
        if actual != header.checksum {
            return Err(DeserializeError::ChecksumMismatch { expected: header.checksum, actual });
        }

        let mut reader = PayloadReader { bytes: payload, pos: 0 };
        let n_stages = reader.count("stage count")?;
        let mut stages = Vec::new();
        for _ in 0..n_stages {
            stages.push(reader.stage()?);
        }
        if reader.pos != payload.len() {
            return Err(DeserializeError::TrailingBytes(payload.len() - reader.pos));
        }

        let cascade = Cascade::from_stages(stages, header.n_features as usize);
        cascade.validate()?;
        Ok(cascade)
    }
}

/// Store `cascade` at `path`, replacing any existing file.
pub fn write_cascade_file(path: &Path, cascade: &Cascade) -> Result<(), SerializeError> {
    let mut writer = BufWriter::new(File::create(path)?);
    NativeCodec::write_to(cascade, &mut writer)
}

pub fn read_cascade_file(path: &Path) -> Result<Cascade, DeserializeError> {
    let mut reader = BufReader::new(File::open(path)?);
    NativeCodec::read_from(&mut reader)
}

fn to_u32(what: &'static str, value: usize) -> Result<u32, SerializeError> {
    u32::try_from(value).map_err(|_| SerializeError::OutOfRange { what, value })
}

// ============================================================================
// Payload writer
// ============================================================================

#[derive(Default)]
struct PayloadWriter {
    bytes: Vec<u8>,
}

impl PayloadWriter {
    fn i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn count(&mut self, what: &'static str, value: usize) -> Result<(), SerializeError> {
        let value = i32::try_from(value).map_err(|_| SerializeError::OutOfRange { what, value })?;
        self.i32(value);
        Ok(())
    }

    fn stage(&mut self, stage: &BoostedStage) -> Result<(), SerializeError> {
        let params = stage.params();
        self.i32(params.boost_type.code());
        self.f32(params.weight_trim_rate);
        self.count("max depth", params.max_depth as usize)?;
        self.count("max weak count", params.max_weak_count as usize)?;
        self.f32(params.min_tar);
        self.f32(params.max_far);
        self.f32(stage.threshold());
        self.count("tree count", stage.n_trees())?;
        for tree in stage.trees() {
            self.tree(tree)?;
        }
        Ok(())
    }

    fn tree(&mut self, tree: &WeakTree) -> Result<(), SerializeError> {
        let mut stack: Vec<(NodeId, usize)> = vec![(0, 0)];
        while let Some((node, depth)) = stack.pop() {
            if depth > MAX_TREE_DEPTH {
                return Err(SerializeError::TooDeep(tree.depth()));
            }
            self.f32(tree.value(node));
            if tree.is_leaf(node) {
                self.bytes.push(0);
                continue;
            }
            self.bytes.push(1);
            self.count("feature index", tree.split_index(node) as usize)?;
            self.f32(tree.split_threshold(node));
            stack.push((tree.right_child(node), depth + 1));
            stack.push((tree.left_child(node), depth + 1));
        }
        Ok(())
    }
}

// ============================================================================
// Payload reader
// ============================================================================

struct PayloadReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl PayloadReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], DeserializeError> {
        let end = self.pos.checked_add(N).ok_or(DeserializeError::Truncated)?;
        let chunk = self.bytes.get(self.pos..end).ok_or(DeserializeError::Truncated)?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DeserializeError> {
        Ok(self.take::<1>()?[0])
    }

    fn i32(&mut self) -> Result<i32, DeserializeError> {
        self.take().map(i32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, DeserializeError> {
        self.take().map(f32::from_le_bytes)
    }

    /// A strictly positive count or size.
    fn count(&mut self, what: &'static str) -> Result<u32, DeserializeError> {
        let value = self.i32()?;
        if value <= 0 {
            return Err(DeserializeError::InvalidCount { what, value });
        }
        Ok(value as u32)
    }

    fn stage(&mut self) -> Result<BoostedStage, DeserializeError> {
        let code = self.i32()?;
        let boost_type = BoostType::from_code(code).ok_or(DeserializeError::UnknownBoostType(code))?;
        let weight_trim_rate = self.f32()?;
        let max_depth = self.count("max depth")?;
        let max_weak_count = self.count("max weak count")?;
        let min_tar = self.f32()?;
        let max_far = self.f32()?;
        let params = StageParams { boost_type, min_tar, max_far, weight_trim_rate, max_depth, max_weak_count };

        let threshold = self.f32()?;
        let n_trees = self.count("tree count")?;
        let mut trees = Vec::new();
        for _ in 0..n_trees {
            trees.push(self.tree()?);
        }
        Ok(BoostedStage::new(params, trees, threshold))
    }

    fn tree(&mut self) -> Result<WeakTree, DeserializeError> {
        let mut tree = MutableTree::new();
        let root = tree.init_root();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if tree.depth(node) > MAX_TREE_DEPTH {
                return Err(DeserializeError::TooDeep);
            }
            let value = self.f32()?;
            match self.u8()? {
                0 => tree.make_leaf(node, value),
                1 => {
                    let feature = self.i32()?;
                    if feature < 0 {
                        return Err(DeserializeError::InvalidCount { what: "feature index", value: feature });
                    }
                    let threshold = self.f32()?;
                    let (left, right) = tree.apply_numeric_split(node, feature as u32, threshold);
                    tree.set_value(node, value);
                    stack.push(right);
                    stack.push(left);
                }
                flag => return Err(DeserializeError::InvalidFlag(flag)),
            }
        }
        Ok(tree.freeze())
    }
}

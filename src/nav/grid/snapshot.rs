//! Grid snapshots: canonical tile wire format, compression, integrity.
//!
//! # Wire format
//!
//! Each tile is two bytes, `[tile_type, collision_mask]`. Tiles are written
//! layer-outer, then row-major (y outer, x inner) within a layer. This order
//! is the same for both grid layouts; Morton ordering is a private storage
//! detail and only shows up inside the `MortonRle` compressed payload.
//!
//! # Compression
//!
//! - `None`: the canonical bytes as-is.
//! - `Rle`: each layer is split into two byte planes (all tile types, then
//!   all collision masks) and the planes are run-length encoded as
//!   `[run_length][value]` pairs. Runs are capped at 255, so longer runs
//!   repeat the pair.
//! - `Deflate`: raw deflate (flate2) over the canonical bytes.
//! - `MortonRle`: like `Rle`, but each layer's planes are first reordered into
//!   Morton rank order, which turns authored rooms and corridors into long runs.
//!
//! The compressed payload is checksummed with CRC-32 (IEEE polynomial
//! `0xEDB88320`, init `0xFFFFFFFF`, final complement) and verified on load.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use bevy::prelude::*;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use super::factory::create_grid_from_tiles;
use super::{CollisionGrid, GridSelection, GridSelectionOptions, MortonMapping};
use crate::nav::error::SnapshotError;
use crate::nav::types::{GridConfig, Position, Tile};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Longest run a single RLE pair can describe.
pub const MAX_RUN: usize = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompressionMode {
    None,
    Rle,
    Deflate,
    MortonRle,
}

/// Self-describing, checksummed grid snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub version: u32,
    pub width: i32,
    pub height: i32,
    pub layers: i32,
    pub border_blocked: bool,
    pub compression: CompressionMode,
    /// Length of the canonical (uncompressed) tile stream.
    pub raw_len: u32,
    /// CRC-32 of `payload`.
    pub checksum: u32,
    pub payload: Vec<u8>,
}

impl GridSnapshot {
    /// Capture the current terrain of `grid`.
    pub fn capture(grid: &dyn CollisionGrid, mode: CompressionMode) -> Result<Self, SnapshotError> {
        let config = *grid.config();
        let raw = encode_tiles(grid);
        let payload = compress(&config, &raw, mode)?;
        debug!(
            "[SNAPSHOT] Captured {}x{}x{} grid: {} raw bytes -> {} bytes ({:?})",
            config.width,
            config.height,
            config.layers,
            raw.len(),
            payload.len(),
            mode
        );
        Ok(Self {
            version: SNAPSHOT_VERSION,
            width: config.width,
            height: config.height,
            layers: config.layers,
            border_blocked: config.border_blocked,
            compression: mode,
            raw_len: raw.len() as u32,
            checksum: checksum(&payload),
            payload,
        })
    }

    pub fn grid_config(&self) -> Result<GridConfig, SnapshotError> {
        Ok(GridConfig::new(self.width, self.height, self.layers, self.border_blocked)?)
    }

    /// Check version and payload integrity.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        let actual = checksum(&self.payload);
        if actual != self.checksum {
            return Err(SnapshotError::ChecksumMismatch { expected: self.checksum, actual });
        }
        Ok(())
    }

    /// Verified, decompressed canonical tile bytes.
    pub fn raw_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        self.verify()?;
        let config = self.grid_config()?;
        let raw = decompress(&config, &self.payload, self.compression)?;
        if raw.len() != self.raw_len as usize || raw.len() != config.cell_count() * 2 {
            return Err(SnapshotError::Corrupt("decoded length does not match grid size"));
        }
        Ok(raw)
    }

    /// Verified tiles in canonical order.
    pub fn tiles(&self) -> Result<Vec<Tile>, SnapshotError> {
        let raw = self.raw_bytes()?;
        Ok(decode_tiles(&raw))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Rebuild a grid from a snapshot, letting the factory pick the layout.
pub fn restore_grid(
    snapshot: &GridSnapshot,
    options: &GridSelectionOptions,
) -> Result<(Box<dyn CollisionGrid>, GridSelection), SnapshotError> {
    let config = snapshot.grid_config()?;
    let tiles = snapshot.tiles()?;
    Ok(create_grid_from_tiles(config, tiles, options)?)
}

/// Overwrite the terrain of an existing grid of identical shape.
pub fn apply_snapshot(grid: &mut dyn CollisionGrid, snapshot: &GridSnapshot) -> Result<(), SnapshotError> {
    let config = snapshot.grid_config()?;
    let current = *grid.config();
    if config.width != current.width || config.height != current.height || config.layers != current.layers {
        return Err(SnapshotError::Corrupt("snapshot shape differs from target grid"));
    }
    let tiles = snapshot.tiles()?;
    for (index, tile) in tiles.into_iter().enumerate() {
        grid.set_tile(config.position_of(index), tile);
    }
    Ok(())
}

pub fn save_snapshot(path: &str, snapshot: &GridSnapshot) -> Result<(), SnapshotError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, snapshot)?;
    writer.flush()?;
    info!("[SNAPSHOT] Saved {} payload bytes to {}", snapshot.payload.len(), path);
    Ok(())
}

pub fn load_snapshot(path: &str) -> Result<GridSnapshot, SnapshotError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let snapshot: GridSnapshot = bincode::deserialize_from(reader)?;
    snapshot.verify()?;
    Ok(snapshot)
}

// ============================================================================
// Canonical tile stream
// ============================================================================

/// Serialize every tile in canonical (layer, y, x) order.
pub fn encode_tiles(grid: &dyn CollisionGrid) -> Vec<u8> {
    let config = grid.config();
    let mut raw = Vec::with_capacity(config.cell_count() * 2);
    for z in 0..config.layers {
        for y in 0..config.height {
            for x in 0..config.width {
                let tile = grid.tile(Position::new(x, y, z)).unwrap_or_default();
                raw.extend_from_slice(&tile.to_bytes());
            }
        }
    }
    raw
}

pub fn decode_tiles(raw: &[u8]) -> Vec<Tile> {
    raw.chunks_exact(2).map(|pair| Tile::from_bytes([pair[0], pair[1]])).collect()
}

pub fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

// ============================================================================
// Codecs
// ============================================================================

pub fn compress(config: &GridConfig, raw: &[u8], mode: CompressionMode) -> Result<Vec<u8>, SnapshotError> {
    match mode {
        CompressionMode::None => Ok(raw.to_vec()),
        CompressionMode::Rle => {
            let planes = to_planes(config, raw, None);
            let mut out = Vec::new();
            rle_encode(&planes, &mut out);
            Ok(out)
        }
        CompressionMode::MortonRle => {
            let mapping = MortonMapping::new(config.width, config.height)?;
            let planes = to_planes(config, raw, Some(&mapping));
            let mut out = Vec::new();
            rle_encode(&planes, &mut out);
            Ok(out)
        }
        CompressionMode::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(raw).map_err(SnapshotError::Deflate)?;
            encoder.finish().map_err(SnapshotError::Deflate)
        }
    }
}

pub fn decompress(config: &GridConfig, payload: &[u8], mode: CompressionMode) -> Result<Vec<u8>, SnapshotError> {
    let raw_len = config.cell_count() * 2;
    match mode {
        CompressionMode::None => Ok(payload.to_vec()),
        CompressionMode::Rle => {
            let planes = rle_decode(payload, raw_len)?;
            Ok(from_planes(config, &planes, None))
        }
        CompressionMode::MortonRle => {
            let mapping = MortonMapping::new(config.width, config.height)?;
            let planes = rle_decode(payload, raw_len)?;
            Ok(from_planes(config, &planes, Some(&mapping)))
        }
        CompressionMode::Deflate => {
            let mut decoder = DeflateDecoder::new(payload);
            let mut raw = Vec::with_capacity(raw_len);
            decoder.read_to_end(&mut raw).map_err(SnapshotError::Deflate)?;
            Ok(raw)
        }
    }
}

/// Run-length encode `data` as `[run][value]` pairs, runs capped at [`MAX_RUN`].
pub fn rle_encode(data: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < data.len() {
        let value = data[i];
        let mut run = 1;
        while run < MAX_RUN && i + run < data.len() && data[i + run] == value {
            run += 1;
        }
        out.push(run as u8);
        out.push(value);
        i += run;
    }
}

/// Decode a `[run][value]` stream that must expand to exactly `expected_len` bytes.
pub fn rle_decode(data: &[u8], expected_len: usize) -> Result<Vec<u8>, SnapshotError> {
    if data.len() % 2 != 0 {
        return Err(SnapshotError::Corrupt("odd-length run stream"));
    }
    let mut out = Vec::with_capacity(expected_len);
    for pair in data.chunks_exact(2) {
        let (run, value) = (pair[0] as usize, pair[1]);
        if run == 0 {
            return Err(SnapshotError::Corrupt("zero-length run"));
        }
        if out.len() + run > expected_len {
            return Err(SnapshotError::Corrupt("run stream overflows grid"));
        }
        out.resize(out.len() + run, value);
    }
    if out.len() != expected_len {
        return Err(SnapshotError::Corrupt("run stream shorter than grid"));
    }
    Ok(out)
}

/// Split canonical tile bytes into per-layer planes: `[types][masks]` for
/// each layer, optionally in Morton rank order.
fn to_planes(config: &GridConfig, raw: &[u8], mapping: Option<&MortonMapping>) -> Vec<u8> {
    let area = config.layer_area();
    let mut planes = Vec::with_capacity(raw.len());
    let mut types = Vec::with_capacity(area);
    let mut masks = Vec::with_capacity(area);
    let mut ordered = Vec::with_capacity(area);

    for layer in raw.chunks_exact(area * 2) {
        types.clear();
        masks.clear();
        for pair in layer.chunks_exact(2) {
            types.push(pair[0]);
            masks.push(pair[1]);
        }
        for plane in [&types, &masks] {
            match mapping {
                Some(m) => {
                    m.to_rank_order(plane, &mut ordered);
                    planes.extend_from_slice(&ordered);
                }
                None => planes.extend_from_slice(plane),
            }
        }
    }
    planes
}

/// Inverse of [`to_planes`].
fn from_planes(config: &GridConfig, planes: &[u8], mapping: Option<&MortonMapping>) -> Vec<u8> {
    let area = config.layer_area();
    let mut raw = Vec::with_capacity(planes.len());
    let mut types = Vec::with_capacity(area);
    let mut masks = Vec::with_capacity(area);

    for layer in planes.chunks_exact(area * 2) {
        let (type_plane, mask_plane) = layer.split_at(area);
        match mapping {
            Some(m) => {
                m.to_row_major(type_plane, &mut types);
                m.to_row_major(mask_plane, &mut masks);
            }
            None => {
                types.clear();
                types.extend_from_slice(type_plane);
                masks.clear();
                masks.extend_from_slice(mask_plane);
            }
        }
        for (t, m) in types.iter().zip(masks.iter()) {
            raw.push(*t);
            raw.push(*m);
        }
    }
    raw
}

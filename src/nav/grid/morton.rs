//! Z-order (Morton) mapping between 2D cells and a dense 1D rank.
//!
//! Morton codes interleave the bits of `x` and `y` over the next
//! power-of-two square enclosing the grid. Codes of out-of-bounds cells are
//! skipped, so ranks are compacted onto `[0, width * height)`:
//!
//! ```text
//! 3x3 grid, 4x4 bounding square      ranks (codes in brackets)
//!
//!  y=2 | 6[8]  7[9]  8[12]           codes 5, 7, 10, 11 ... fall
//!  y=1 | 2[2]  3[3]  5[6]            outside the 3x3 grid and get
//!  y=0 | 0[0]  1[1]  4[4]            no rank
//! ```
//!
//! Nearby cells get nearby ranks, so a rank-ordered array keeps small
//! rectangles in few cache lines.

use crate::nav::error::GridError;

/// Largest side length addressable with `u16` coordinates.
pub const MAX_MORTON_SIDE: i32 = u16::MAX as i32;

/// Spread the 16 bits of `v` into the even bits of a `u32`.
#[inline]
pub fn part1by1(v: u16) -> u32 {
    let mut x = v as u32;
    x = (x | (x << 8)) & 0x00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333;
    x = (x | (x << 1)) & 0x5555_5555;
    x
}

/// Gather the even bits of `v` back into a `u16`.
#[inline]
pub fn compact1by1(v: u32) -> u16 {
    let mut x = v & 0x5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF;
    x as u16
}

#[inline]
pub fn morton_encode(x: u16, y: u16) -> u32 {
    part1by1(x) | (part1by1(y) << 1)
}

#[inline]
pub fn morton_decode(code: u32) -> (u16, u16) {
    (compact1by1(code), compact1by1(code >> 1))
}

/// Precomputed rank tables for one `width x height` layer shape.
#[derive(Clone, Debug)]
pub struct MortonMapping {
    width: u16,
    height: u16,
    side: u32,
    /// Indexed by row-major `y * width + x`.
    pos_to_rank: Vec<u32>,
    /// Indexed by rank.
    rank_to_pos: Vec<(u16, u16)>,
}

impl MortonMapping {
    pub fn new(width: i32, height: i32) -> Result<Self, GridError> {
        if width <= 0 || height <= 0 {
            return Err(GridError::InvalidDimensions { width, height, layers: 1 });
        }
        if width > MAX_MORTON_SIDE || height > MAX_MORTON_SIDE {
            return Err(GridError::DimensionsTooLarge { width, height });
        }

        let (w, h) = (width as u16, height as u16);
        let area = w as usize * h as usize;
        let side = (w.max(h) as u32).next_power_of_two();

        // Sorting the in-bounds codes is O(area log area) regardless of how
        // lopsided the bounding square is.
        let mut codes: Vec<(u32, u16, u16)> = Vec::with_capacity(area);
        for y in 0..h {
            for x in 0..w {
                codes.push((morton_encode(x, y), x, y));
            }
        }
        codes.sort_unstable_by_key(|&(code, _, _)| code);

        let mut pos_to_rank = vec![0u32; area];
        let mut rank_to_pos = Vec::with_capacity(area);
        for (rank, &(_, x, y)) in codes.iter().enumerate() {
            pos_to_rank[y as usize * w as usize + x as usize] = rank as u32;
            rank_to_pos.push((x, y));
        }

        Ok(Self { width: w, height: h, side, pos_to_rank, rank_to_pos })
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width as i32
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height as i32
    }

    /// Side of the power-of-two bounding square.
    pub fn side(&self) -> u32 {
        self.side
    }

    /// Number of ranks (cells in one layer).
    #[inline]
    pub fn len(&self) -> usize {
        self.rank_to_pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rank_to_pos.is_empty()
    }

    /// Rank of an in-bounds cell. Caller checks bounds.
    #[inline]
    pub fn pos_to_rank(&self, x: i32, y: i32) -> u32 {
        self.pos_to_rank[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn rank_to_pos(&self, rank: u32) -> (u16, u16) {
        self.rank_to_pos[rank as usize]
    }

    /// Rank table in row-major cell order.
    pub fn ranks(&self) -> &[u32] {
        &self.pos_to_rank
    }

    /// Heap bytes held by both tables.
    pub fn memory_bytes(&self) -> usize {
        self.pos_to_rank.len() * std::mem::size_of::<u32>()
            + self.rank_to_pos.len() * std::mem::size_of::<(u16, u16)>()
    }

    /// Reorder one layer of row-major bytes into rank order.
    pub fn to_rank_order<T: Copy>(&self, row_major: &[T], out: &mut Vec<T>) {
        out.clear();
        out.extend(self.rank_to_pos.iter().map(|&(x, y)| row_major[y as usize * self.width as usize + x as usize]));
    }

    /// Inverse of [`MortonMapping::to_rank_order`].
    pub fn to_row_major<T: Copy>(&self, rank_ordered: &[T], out: &mut Vec<T>) {
        out.clear();
        out.extend(self.pos_to_rank.iter().map(|&rank| rank_ordered[rank as usize]));
    }
}

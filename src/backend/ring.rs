//! AF_PACKET ring geometry.

use crate::error::ResourceError;

/// Frames per block; the kernel ring default.
pub const FRAMES_PER_BLOCK: usize = 128;

/// `TPACKET_ALIGNMENT`: every ring frame starts on this boundary.
pub const FRAME_ALIGNMENT: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingGeometry {
    pub frame_size: usize,
    pub block_size: usize,
    pub num_blocks: usize,
}

impl RingGeometry {
    pub fn frame_count(&self) -> usize {
        self.block_size / self.frame_size * self.num_blocks
    }

    pub fn len(&self) -> usize {
        self.block_size * self.num_blocks
    }
}

/// Fits as many `snaplen`-sized frames as a `budget_mb` MiB ring allows.
///
/// Sub-page requests round up to a multiple of `page_size / 128` so a block
/// of 128 frames is always page aligned; larger ones round up to whole pages
/// plus one.
pub fn size(budget_mb: usize, snaplen: usize, page_size: usize) -> Result<RingGeometry, ResourceError> {
    let snaplen = snaplen.max(1);
    let frame_size = if snaplen < page_size {
        let unit = (page_size / FRAMES_PER_BLOCK).max(FRAME_ALIGNMENT);
        snaplen.div_ceil(unit) * unit
    } else {
        (snaplen / page_size + 1) * page_size
    };

    let block_size = frame_size * FRAMES_PER_BLOCK;
    let num_blocks = budget_mb * 1024 * 1024 / block_size;
    if num_blocks == 0 {
        return Err(ResourceError::RingTooSmall {
            budget_mb,
            block_size,
        });
    }

    Ok(RingGeometry {
        frame_size,
        block_size,
        num_blocks,
    })
}

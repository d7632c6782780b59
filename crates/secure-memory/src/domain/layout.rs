//! Integrity tree layout
//!
//! The memory device reports one range `[start, end)`. The lower half is the
//! data region visible to requesters; the upper half holds, in order:
//!
//! ```text
//! data_end ─┬─ HMAC array      one tag per data block
//!           ├─ counters        one block per page        (leaf tree level)
//!           ├─ level n-1       ceil(counters / arity) nodes
//!           ├─ ...
//!           └─ root            exactly one block
//! ```
//!
//! `levels` lists level base addresses: `[hmac, root, ..., counters, data]`.
//! Index 0 is the HMAC array, index 1 the root, the second-to-last the
//! counters and the last the data region. From the root down to the data
//! region the bases are strictly decreasing.

use shared_types::{Addr, AddrRange};

use super::config::SecureMemoryConfig;
use crate::error::SecureMemoryError;

/// Index of the HMAC array in `levels`.
pub const HMAC_LEVEL: usize = 0;
/// Index of the root node in `levels`.
pub const ROOT_LEVEL: usize = 1;

/// Address partitioning of data and integrity metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityLayout {
    range: AddrRange,
    data_end: Addr,
    levels: Vec<Addr>,
    arity: u64,
    block_size: u64,
    hmac_size: u64,
    page_size: u64,
}

impl IntegrityLayout {
    /// Derive the layout for a device range.
    ///
    /// # Errors
    ///
    /// `Configuration` if the range does not start at zero, if the data half
    /// is not a whole number of pages (so it cannot hold a counter, let alone
    /// a root), or if the metadata does not fit in the upper half.
    pub fn compute(
        range: AddrRange,
        arity: u64,
        block_size: u64,
        hmac_size: u64,
        page_size: u64,
    ) -> Result<Self, SecureMemoryError> {
        if range.start != 0 {
            return Err(SecureMemoryError::Configuration(format!(
                "start address must be zero, got {:#x}",
                range.start
            )));
        }
        if arity < 2 || block_size == 0 || page_size < block_size {
            return Err(SecureMemoryError::Configuration(format!(
                "unusable geometry: arity={arity} block={block_size} page={page_size}"
            )));
        }

        let data_size = range.size() / 2;
        let data_end = range.start + data_size;
        let counter_nodes = data_size / page_size;

        if counter_nodes == 0 || data_size % page_size != 0 {
            return Err(SecureMemoryError::Configuration(format!(
                "data region {} bytes cannot hold a root node (page size {})",
                data_size, page_size
            )));
        }

        let hmac_bytes = round_up((data_size / block_size) * hmac_size, block_size);
        let counter_base = data_end + hmac_bytes;

        // Leaf (counter) level first, root last.
        let mut tree = vec![counter_base];
        let mut base = counter_base;
        let mut nodes = counter_nodes;
        while nodes > 1 {
            base += nodes * block_size;
            nodes = nodes.div_ceil(arity);
            tree.push(base);
        }

        let metadata_end = base + block_size;
        if metadata_end > range.end {
            return Err(SecureMemoryError::Configuration(format!(
                "metadata ends at {:#x}, beyond device end {:#x}",
                metadata_end, range.end
            )));
        }

        let mut levels = Vec::with_capacity(tree.len() + 2);
        levels.push(data_end);
        levels.extend(tree.iter().rev());
        levels.push(range.start);

        Ok(Self {
            range,
            data_end,
            levels,
            arity,
            block_size,
            hmac_size,
            page_size,
        })
    }

    /// Derive the layout using the geometry of `config`.
    pub fn from_config(
        range: AddrRange,
        config: &SecureMemoryConfig,
    ) -> Result<Self, SecureMemoryError> {
        Self::compute(
            range,
            config.arity,
            config.block_size,
            config.hmac_size,
            config.page_size,
        )
    }

    /// Level base addresses, `[hmac, root, ..., counters, data]`.
    pub fn levels(&self) -> &[Addr] {
        &self.levels
    }

    pub fn hmac_level(&self) -> usize {
        HMAC_LEVEL
    }

    pub fn root_level(&self) -> usize {
        ROOT_LEVEL
    }

    pub fn counter_level(&self) -> usize {
        self.levels.len() - 2
    }

    pub fn data_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// Number of tree nodes (counter through root) guarding each data block.
    pub fn depth(&self) -> usize {
        self.counter_level() - ROOT_LEVEL + 1
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn root_addr(&self) -> Addr {
        self.levels[ROOT_LEVEL]
    }

    pub fn data_end(&self) -> Addr {
        self.data_end
    }

    /// The full device range.
    pub fn device_range(&self) -> AddrRange {
        self.range
    }

    /// The externally visible data region.
    pub fn data_range(&self) -> AddrRange {
        AddrRange::new(self.range.start, self.data_end)
    }

    /// The HMAC array.
    pub fn hmac_range(&self) -> AddrRange {
        AddrRange::new(self.levels[HMAC_LEVEL], self.levels[self.counter_level()])
    }

    pub fn is_data(&self, addr: Addr) -> bool {
        self.data_range().contains(addr)
    }

    pub fn is_hmac(&self, addr: Addr) -> bool {
        self.hmac_range().contains(addr)
    }

    pub fn is_root(&self, addr: Addr) -> bool {
        self.level_range(ROOT_LEVEL).contains(addr)
    }

    /// Address range occupied by tree level `level`.
    fn level_range(&self, level: usize) -> AddrRange {
        let start = self.levels[level];
        let end = if level == ROOT_LEVEL {
            start + self.block_size
        } else {
            self.levels[level - 1]
        };
        AddrRange::new(start, end)
    }

    /// The level an address belongs to, `None` if it is outside every level.
    pub fn level_of(&self, addr: Addr) -> Option<usize> {
        if self.is_data(addr) {
            return Some(self.data_level());
        }
        if self.is_hmac(addr) {
            return Some(HMAC_LEVEL);
        }
        (ROOT_LEVEL..=self.counter_level()).find(|&level| self.level_range(level).contains(addr))
    }

    /// Block-aligned address of the HMAC entry covering a data address.
    pub fn hmac_addr(&self, data_addr: Addr) -> Option<Addr> {
        if !self.is_data(data_addr) {
            return None;
        }
        let raw = self.raw_hmac_addr(data_addr);
        Some(raw - (raw % self.block_size))
    }

    /// Byte offset of a data block's tag inside its HMAC block.
    pub fn hmac_tag_offset(&self, data_addr: Addr) -> usize {
        (self.raw_hmac_addr(data_addr) % self.block_size) as usize
    }

    /// Data blocks whose tags live in the HMAC block at `hmac_addr`.
    pub fn hmac_coverage(&self, hmac_addr: Addr) -> Option<AddrRange> {
        if !self.is_hmac(hmac_addr) {
            return None;
        }
        let block = hmac_addr - (hmac_addr % self.block_size);
        let first_tag = (block - self.levels[HMAC_LEVEL]) / self.hmac_size;
        let start = self.range.start + first_tag * self.block_size;
        let tags_per_block = self.block_size / self.hmac_size;
        let end = (start + tags_per_block * self.block_size).min(self.data_end);
        Some(AddrRange::new(start, end))
    }

    fn raw_hmac_addr(&self, data_addr: Addr) -> Addr {
        self.levels[HMAC_LEVEL] + ((data_addr - self.range.start) / self.block_size) * self.hmac_size
    }

    /// The tree node authenticating `addr`; `None` for the root, HMAC
    /// entries and unknown addresses.
    pub fn parent_addr(&self, addr: Addr) -> Option<Addr> {
        if self.is_data(addr) {
            let page = (addr - self.range.start) / self.page_size;
            return Some(self.levels[self.counter_level()] + page * self.block_size);
        }

        let level = self.level_of(addr)?;
        if level <= ROOT_LEVEL {
            return None;
        }
        let index = (addr - self.levels[level]) / self.block_size;
        Some(self.levels[level - 1] + (index / self.arity) * self.block_size)
    }

    /// All addresses whose parent is `parent`, as one contiguous range.
    pub fn children_range(&self, parent: Addr) -> Option<AddrRange> {
        let level = self.level_of(parent)?;
        if level == HMAC_LEVEL || level == self.data_level() {
            return None;
        }
        let index = (parent - self.levels[level]) / self.block_size;

        if level == self.counter_level() {
            let start = self.range.start + index * self.page_size;
            return Some(AddrRange::new(start, start + self.page_size));
        }

        let child = self.level_range(level + 1);
        let start = child.start + index * self.arity * self.block_size;
        let end = (start + self.arity * self.block_size).min(child.end);
        Some(AddrRange::new(start, end))
    }

    /// Tree nodes from the counter up to and including the root.
    pub fn auth_chain(&self, addr: Addr) -> Vec<Addr> {
        let mut chain = Vec::with_capacity(self.depth());
        let mut current = addr;
        while let Some(parent) = self.parent_addr(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

fn round_up(value: u64, multiple: u64) -> u64 {
    value.div_ceil(multiple) * multiple
}

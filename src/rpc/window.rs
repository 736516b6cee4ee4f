//! Block-range windows for bounded log queries.

use std::fmt;

/// Inclusive block range of a single `eth_getLogs` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogQueryWindow {
    pub from_block: u64,
    pub to_block: u64,
}

impl LogQueryWindow {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
        }
    }

    /// Number of blocks covered, both ends inclusive.
    pub fn len(&self) -> u64 {
        self.to_block.saturating_sub(self.from_block) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.from_block > self.to_block
    }
}

impl fmt::Display for LogQueryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from_block, self.to_block)
    }
}

/// Split `[from_block, to_block]` into ascending, non-overlapping windows of at
/// most `max_range_blocks` blocks. The last window may be shorter.
///
/// An inverted range yields no windows.
pub fn partition(from_block: u64, to_block: u64, max_range_blocks: u64) -> Vec<LogQueryWindow> {
    let step = max_range_blocks.max(1);
    let mut windows = Vec::new();
    if from_block > to_block {
        return windows;
    }

    let mut start = from_block;
    loop {
        let end = start.saturating_add(step - 1).min(to_block);
        windows.push(LogQueryWindow::new(start, end));
        if end == to_block {
            break;
        }
        start = end + 1;
    }
    windows
}

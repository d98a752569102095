//! Device table parser
//!
//! Parses the tabular text printed by `usbipd list`:
//!
//! ```text
//! Connected:
//! BUSID  VID:PID    DEVICE                                  STATE
//! 2-4    1050:0407  USB Input Device, Smartcard Reader      Not shared
//!
//! Persisted:
//! GUID                                  DEVICE
//! ```
//!
//! Columns are separated by runs of two or more whitespace characters, so a
//! device descriptor may itself contain single spaces.

use crate::types::DeviceRecord;

/// Minimum number of cells for a row to be a device record
pub const MIN_ROW_CELLS: usize = 4;

/// Separator used when a descriptor spans several cells
const DESCRIPTOR_JOIN: &str = "  ";

/// Parse the enumeration output into records, preserving row order
///
/// The first line is a header and is discarded. Rows with fewer than
/// [`MIN_ROW_CELLS`] cells are skipped rather than failing the whole parse.
/// A leading `Connected:` section title is skipped, and parsing stops at the
/// next section title (the `Persisted:` list of unplugged devices).
pub fn parse_device_table(output: &str) -> Vec<DeviceRecord> {
    let mut lines = output.lines().filter(|line| !line.trim().is_empty());

    let mut header = lines.next();
    if header.is_some_and(is_section_title) {
        header = lines.next();
    }
    if header.is_none() {
        return Vec::new();
    }

    lines
        .take_while(|line| !is_section_title(line))
        .filter_map(parse_row)
        .collect()
}

/// Parse a single table row
///
/// Returns `None` when the row has fewer than [`MIN_ROW_CELLS`] cells.
pub fn parse_row(line: &str) -> Option<DeviceRecord> {
    let cells = split_cells(line);
    if cells.len() < MIN_ROW_CELLS {
        return None;
    }

    let last = cells.len() - 1;
    Some(DeviceRecord {
        busid: cells[0].to_string(),
        vidpid: cells[1].to_string(),
        descriptor: cells[2..last].join(DESCRIPTOR_JOIN),
        raw_state: cells[last].to_string(),
    })
}

/// Split a line on runs of two or more whitespace characters
///
/// Each cell is trimmed; empty cells are dropped.
pub fn split_cells(line: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let mut start = 0;
    let mut run_start: Option<usize> = None;
    let mut run_len = 0;

    for (idx, ch) in line.char_indices() {
        if ch.is_whitespace() {
            if run_start.is_none() {
                run_start = Some(idx);
                run_len = 0;
            }
            run_len += 1;
            continue;
        }

        if let Some(ws) = run_start.take()
            && run_len >= 2
        {
            push_cell(&mut cells, &line[start..ws]);
            start = idx;
        }
    }
    push_cell(&mut cells, &line[start..]);

    cells
}

fn push_cell<'a>(cells: &mut Vec<&'a str>, raw: &'a str) {
    let cell = raw.trim();
    if !cell.is_empty() {
        cells.push(cell);
    }
}

/// A section title is a lone word ending in ':' (e.g. "Connected:")
fn is_section_title(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.ends_with(':') && split_cells(trimmed).len() == 1
}

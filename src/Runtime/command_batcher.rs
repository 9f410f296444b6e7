use super::mesh::greedy_mesh;
use crate::Core::config::RuntimeConfig;
use crate::Core::error::WireError;
use crate::Wire::codec;
use crate::Wire::scalar::{PlainScalar, ScalarValue};
use crate::Wire::Structs::{Cell, Command, CycleEndResponse, FormatCommand, Range, Rect, SetCommand};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A command waiting for the end of the cycle, in enqueue order.
#[derive(Clone, Debug, PartialEq)]
pub enum QueuedCommand {
    Set {
        sheet: String,
        rects: Vec<Rect>,
        value: ScalarValue,
    },
    Format {
        sheet: String,
        rects: Vec<Rect>,
        format: String,
    },
    /// A [`Command`] already encoded by another delivery path.
    Encoded(Vec<u8>),
}

impl QueuedCommand {
    fn into_command(self) -> Result<Command, WireError> {
        match self {
            QueuedCommand::Set { sheet, rects, value } => Ok(Command::Set(SetCommand {
                target: Range::new(sheet, rects),
                value,
            })),
            QueuedCommand::Format { sheet, rects, format } => Ok(Command::Format(FormatCommand {
                target: Range::new(sheet, rects),
                format,
            })),
            QueuedCommand::Encoded(data) => codec::decode(&data),
        }
    }
}

/// Per-sheet, per-cell writes for the current cycle. Last write wins.
#[derive(Default)]
pub(crate) struct CellBuffers {
    pub(crate) sets: BTreeMap<String, HashMap<Cell, PlainScalar>>,
    pub(crate) formats: BTreeMap<String, HashMap<Cell, String>>,
}

impl CellBuffers {
    pub(crate) fn cell_count(&self) -> usize {
        self.sets.values().map(HashMap::len).sum::<usize>()
            + self.formats.values().map(HashMap::len).sum::<usize>()
    }
}

/// Coalesces per-cell value and format writes issued during one calculation
/// cycle into a handful of rectangle-based commands.
///
/// Small plain-scalar writes are buffered per cell and meshed at flush time.
/// Large ranges and structured values go straight to the queue, after
/// everything buffered so far, so program order within one caller holds.
pub struct CommandBatcher {
    threshold: u64,
    rects_per_command: usize,
    pub(crate) buffer: Mutex<CellBuffers>,
    pub(crate) queue: Mutex<Vec<QueuedCommand>>,
}

impl CommandBatcher {
    pub fn new(threshold: u64, rects_per_command: usize) -> Self {
        Self {
            threshold,
            rects_per_command: rects_per_command.max(1),
            buffer: Mutex::new(CellBuffers::default()),
            queue: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.batching_threshold, config.rects_per_command)
    }

    /// Schedules `value` to be written to every cell of `target`.
    pub fn schedule_set(&self, target: &Range, value: ScalarValue) {
        let total_cells = target.cell_count();

        if let Some(plain) = value.as_plain() {
            if total_cells <= self.threshold {
                if total_cells == 0 {
                    return;
                }
                let mut buffer = self.buffer.lock();
                let cells = buffer.sets.entry(target.sheet_name.clone()).or_default();
                for rect in &target.rects {
                    for cell in rect.cells() {
                        cells.insert(cell, plain.clone());
                    }
                }
                return;
            }
            debug!(
                "set on {}!{} cells bypasses cell buffer",
                target.sheet_name, total_cells
            );
        }

        self.flush_buffers();
        self.queue.lock().push(QueuedCommand::Set {
            sheet: target.sheet_name.clone(),
            rects: target.rects.clone(),
            value,
        });
    }

    /// Schedules a number format for every cell of `target`.
    pub fn schedule_format(&self, target: &Range, format: impl Into<String>) {
        let format = format.into();
        let total_cells = target.cell_count();

        if total_cells <= self.threshold {
            if total_cells == 0 {
                return;
            }
            let mut buffer = self.buffer.lock();
            let cells = buffer.formats.entry(target.sheet_name.clone()).or_default();
            for rect in &target.rects {
                for cell in rect.cells() {
                    cells.insert(cell, format.clone());
                }
            }
            return;
        }

        debug!(
            "format on {}!{} cells bypasses cell buffer",
            target.sheet_name, total_cells
        );
        self.flush_buffers();
        self.queue.lock().push(QueuedCommand::Format {
            sheet: target.sheet_name.clone(),
            rects: target.rects.clone(),
            format,
        });
    }

    /// Queues a command that was encoded elsewhere. It is decoded at flush
    /// time; an undecodable payload is dropped with a warning.
    pub fn schedule_encoded(&self, command: Vec<u8>) {
        self.flush_buffers();
        self.queue.lock().push(QueuedCommand::Encoded(command));
    }

    /// Moves every buffered cell write into the queue as meshed commands.
    fn flush_buffers(&self) {
        let mut buffer = self.buffer.lock();
        if buffer.sets.is_empty() && buffer.formats.is_empty() {
            return;
        }

        let mut pending = Vec::new();

        for (sheet, cells) in std::mem::take(&mut buffer.sets) {
            for (value, rects) in mesh_groups(cells) {
                for batch in rects.chunks(self.rects_per_command) {
                    pending.push(QueuedCommand::Set {
                        sheet: sheet.clone(),
                        rects: batch.to_vec(),
                        value: value.clone().into(),
                    });
                }
            }
        }

        for (sheet, cells) in std::mem::take(&mut buffer.formats) {
            for (format, rects) in mesh_groups(cells) {
                for batch in rects.chunks(self.rects_per_command) {
                    pending.push(QueuedCommand::Format {
                        sheet: sheet.clone(),
                        rects: batch.to_vec(),
                        format: format.clone(),
                    });
                }
            }
        }

        // Buffer lock is still held: a concurrent flush cannot slip in between.
        self.queue.lock().extend(pending);
    }

    /// Flushes buffered writes and encodes the whole queue as one
    /// [`CycleEndResponse`]. Returns `None` when there is nothing to send.
    /// All state is cleared either way.
    pub fn flush_commands(&self) -> Result<Option<Vec<u8>>, WireError> {
        self.flush_buffers();
        let queued = std::mem::take(&mut *self.queue.lock());
        if queued.is_empty() {
            return Ok(None);
        }

        let mut commands = Vec::with_capacity(queued.len());
        for cmd in queued {
            match cmd.into_command() {
                Ok(command) => commands.push(command),
                Err(e) => warn!("dropping undecodable queued command: {e}"),
            }
        }
        if commands.is_empty() {
            return Ok(None);
        }

        debug!("flushing {} commands", commands.len());
        codec::encode(&CycleEndResponse { commands }).map(Some)
    }

    /// Drops all buffered and queued state without producing output.
    pub fn clear(&self) {
        self.queue.lock().clear();
        *self.buffer.lock() = CellBuffers::default();
    }

    /// Number of distinct (sheet, cell) writes waiting to be meshed.
    pub fn buffered_cells(&self) -> usize {
        self.buffer.lock().cell_count()
    }

    pub fn queued_commands(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Groups cells by payload and meshes each group. Groups come back ordered by
/// their top-left cell so the output does not depend on hash order.
fn mesh_groups<V: Hash + Eq>(cells: HashMap<Cell, V>) -> Vec<(V, Vec<Rect>)> {
    let mut by_value: HashMap<V, Vec<Cell>> = HashMap::new();
    for (cell, value) in cells {
        by_value.entry(value).or_default().push(cell);
    }

    let mut groups: Vec<(V, Vec<Rect>)> = by_value
        .into_iter()
        .map(|(value, cells)| (value, greedy_mesh(&cells)))
        .collect();
    groups.sort_by_key(|(_, rects)| rects.first().map(|r| (r.row_first, r.col_first)));
    groups
}

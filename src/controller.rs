//! Control loop body
//!
//! One `poll` is one iteration of the main loop: socket events first, then
//! completed requests into the sequencer, then button gestures through the
//! board bindings. Runs entirely in the poll context.

use crate::board::{Board, BoardConfig};
use crate::buttons::ButtonRegistry;
use crate::http::{RequestEngine, Transport};
use crate::sequencer::{DeviceState, Sequencer};
use crate::types::Command;

pub struct Controller<T: Transport> {
    board: Board,
    engine: RequestEngine<T>,
    sequencer: Sequencer,
}

impl<T: Transport> Controller<T> {
    pub fn new(board: Board, transport: T) -> Self {
        Self::with_engine(board, RequestEngine::new(transport))
    }

    pub fn with_engine(board: Board, engine: RequestEngine<T>) -> Self {
        Self {
            board,
            engine,
            sequencer: Sequencer::new(),
        }
    }

    /// Run one iteration. Returns true if the mirrored state changed and the
    /// display should be redrawn.
    pub fn poll(&mut self, buttons: &ButtonRegistry, now_ms: u64) -> bool {
        let mut changed = false;

        self.engine.service(now_ms);
        self.engine.poll_completed();
        while let Some(request) = self.engine.take_completed() {
            changed |= self
                .sequencer
                .on_completed(&request, &mut self.engine, now_ms);
        }

        let board = self.board;
        for (id, button) in buttons.iter() {
            // timestamps on the edge path are 32-bit milliseconds
            for gesture in button.state.poll_gestures(now_ms as u32) {
                trace!("{} {}", button.spec.name, gesture);
                for command in board.commands_for(id, gesture) {
                    changed |= self.dispatch(command, now_ms);
                }
            }
        }

        changed
    }

    pub fn dispatch(&mut self, command: Command, now_ms: u64) -> bool {
        self.sequencer.execute(command, &mut self.engine, now_ms)
    }

    pub fn board(&self) -> Board {
        self.board
    }

    pub fn state(&self) -> &DeviceState {
        self.sequencer.state()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn engine(&self) -> &RequestEngine<T> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut RequestEngine<T> {
        &mut self.engine
    }
}

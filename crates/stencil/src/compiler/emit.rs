//! The code emitter: an append-only instruction sink.
//!
//! Block-structured directives open a fresh buffer for their body and take
//! it back when the block closes; the stack height is the nesting depth.
//! Depth underflow is an internal invariant violation (a compiler bug, not
//! a user error) and panics.

use crate::ir::{Instr, Program};

#[derive(Debug)]
pub(crate) struct Emitter {
    stack: Vec<Program>,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter {
            stack: vec![Vec::new()],
        }
    }

    /// Appends an instruction at the current depth.
    pub fn add(&mut self, instr: Instr) {
        self.stack
            .last_mut()
            .expect("emitter depth underflow")
            .push(instr);
    }

    /// Opens a nested instruction buffer (depth + 1).
    pub fn open(&mut self) {
        self.stack.push(Vec::new());
    }

    /// Closes the top buffer and returns it (depth - 1).
    pub fn close(&mut self) -> Program {
        assert!(self.stack.len() > 1, "emitter depth underflow");
        self.stack.pop().expect("emitter depth underflow")
    }

    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Finishes the compilation pass, returning the assembled top-level
    /// program. All opened buffers must have been closed.
    pub fn finish(mut self) -> Program {
        assert_eq!(self.stack.len(), 1, "unclosed emitter buffers");
        self.stack.pop().expect("emitter depth underflow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_close_pairing() {
        let mut emitter = Emitter::new();
        emitter.add(Instr::Text("a".into()));
        emitter.open();
        emitter.add(Instr::Text("b".into()));
        assert_eq!(emitter.depth(), 1);
        let inner = emitter.close();
        assert_eq!(inner.len(), 1);
        assert_eq!(emitter.depth(), 0);
        let program = emitter.finish();
        assert_eq!(program.len(), 1);
    }

    #[test]
    #[should_panic(expected = "emitter depth underflow")]
    fn test_depth_cannot_go_negative() {
        let mut emitter = Emitter::new();
        emitter.close();
    }
}

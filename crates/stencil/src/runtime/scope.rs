//! The variable scope chain.
//!
//! An explicit stack of mutable frames, searched innermost-out. A procedure
//! invocation pushes a fresh frame onto whatever chain is active at the
//! call site — that is the whole dynamic-scope rule: free variables see the
//! caller's world as it is at call time, while the invocation's own
//! bindings die with its frame.

use std::collections::HashMap;

use stencil_expr::Value;

#[derive(Debug)]
pub(crate) struct Scopes {
    frames: Vec<HashMap<String, Value>>,
}

impl Scopes {
    pub fn new(globals: HashMap<String, Value>) -> Self {
        Scopes {
            frames: vec![globals],
        }
    }

    /// Looks a name up, innermost frame first.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).cloned())
    }

    /// Binds a name in the innermost frame.
    pub fn set(&mut self, name: &str, value: Value) {
        self.frames
            .last_mut()
            .expect("scope chain is never empty")
            .insert(name.to_string(), value);
    }

    /// The innermost frame's own binding, ignoring outer frames. Used by
    /// `with` to save and restore exactly what it shadows.
    pub fn local_get(&self, name: &str) -> Option<Value> {
        self.frames
            .last()
            .expect("scope chain is never empty")
            .get(name)
            .cloned()
    }

    /// Removes a name from the innermost frame.
    pub fn local_remove(&mut self, name: &str) {
        self.frames
            .last_mut()
            .expect("scope chain is never empty")
            .remove(name);
    }

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop the global frame");
        self.frames.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_frame_shadows_and_unwinds() {
        let mut scopes = Scopes::new(HashMap::new());
        scopes.set("x", Value::Int(1));
        scopes.push_frame();
        scopes.set("x", Value::Int(2));
        assert_eq!(scopes.get("x"), Some(Value::Int(2)));
        scopes.pop_frame();
        assert_eq!(scopes.get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn test_outer_frames_stay_visible() {
        let mut scopes = Scopes::new(HashMap::new());
        scopes.set("a", Value::str("A"));
        scopes.push_frame();
        assert_eq!(scopes.get("a"), Some(Value::str("A")));
        assert_eq!(scopes.local_get("a"), None);
    }
}

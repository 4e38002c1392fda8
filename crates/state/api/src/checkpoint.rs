use core::ops::{Deref, DerefMut};

use edr_primitives::B256;

use crate::{StateError, StateView};

/// LIFO stack of state roots saved by checkpoints.
#[derive(Clone, Debug, Default)]
pub struct Checkpoints {
    roots: Vec<B256>,
}

impl Checkpoints {
    /// Pushes a state root.
    pub fn push(&mut self, state_root: B256) {
        self.roots.push(state_root);
    }

    /// Pops the most recent state root. Fails if there is none.
    pub fn pop(&mut self, action: &'static str) -> Result<B256, StateError> {
        self.roots
            .pop()
            .ok_or(StateError::NotCheckpointed { action })
    }

    /// Whether there are no outstanding checkpoints.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The number of outstanding checkpoints.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Fails if there are outstanding checkpoints.
    pub fn ensure_empty(&self, action: &'static str) -> Result<(), StateError> {
        if self.roots.is_empty() {
            Ok(())
        } else {
            Err(StateError::CalledWhileCheckpointed { action })
        }
    }
}

/// A checkpoint on a [`StateView`] that is reverted when dropped, unless it
/// was explicitly committed or reverted.
#[derive(Debug)]
pub struct CheckpointGuard<'state, StateT: StateView + ?Sized> {
    state: &'state mut StateT,
    finished: bool,
}

impl<'state, StateT: StateView + ?Sized> CheckpointGuard<'state, StateT> {
    /// Creates a checkpoint on the provided state.
    pub fn new(state: &'state mut StateT) -> Result<Self, StateError> {
        state.checkpoint()?;

        Ok(Self {
            state,
            finished: false,
        })
    }

    /// Keeps all changes made since the checkpoint.
    pub fn commit(mut self) -> Result<(), StateError> {
        self.finished = true;
        self.state.commit()
    }

    /// Discards all changes made since the checkpoint.
    pub fn revert(mut self) -> Result<(), StateError> {
        self.finished = true;
        self.state.revert()
    }
}

impl<StateT: StateView + ?Sized> Deref for CheckpointGuard<'_, StateT> {
    type Target = StateT;

    fn deref(&self) -> &Self::Target {
        self.state
    }
}

impl<StateT: StateView + ?Sized> DerefMut for CheckpointGuard<'_, StateT> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.state
    }
}

impl<StateT: StateView + ?Sized> Drop for CheckpointGuard<'_, StateT> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(error) = self.state.revert() {
                log::error!("Failed to revert dangling state checkpoint: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_on_empty_stack() {
        let mut checkpoints = Checkpoints::default();

        let error = checkpoints.pop("commit").unwrap_err();
        assert_eq!(error.to_string(), "commit called when not checkpointed");
    }

    #[test]
    fn duplicate_roots_are_allowed() -> Result<(), StateError> {
        let mut checkpoints = Checkpoints::default();
        checkpoints.push(B256::ZERO);
        checkpoints.push(B256::ZERO);
        assert_eq!(checkpoints.len(), 2);

        let error = checkpoints.ensure_empty("setStateRoot").unwrap_err();
        assert_eq!(error.to_string(), "setStateRoot called when checkpointed");

        checkpoints.pop("revert")?;
        checkpoints.pop("revert")?;
        assert!(checkpoints.is_empty());

        Ok(())
    }
}

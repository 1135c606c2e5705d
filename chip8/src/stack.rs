//! Subroutine call stack.
use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// Stack of return pointers used for jumping when a routine call finishes.
pub struct CallStack {
    frames: [Address; STACK_SIZE],
    /// Stack pointer, the number of occupied frames.
    sp: usize,
}

impl Default for CallStack {
    fn default() -> Self {
        Self {
            frames: [0; STACK_SIZE],
            sp: 0,
        }
    }
}

impl CallStack {
    pub fn push(&mut self, address: Address) -> Chip8Result<()> {
        let frame = self.frames.get_mut(self.sp).ok_or(Chip8Error::StackOverflow)?;
        *frame = address;
        self.sp += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Chip8Result<Address> {
        let sp = self.sp.checked_sub(1).ok_or(Chip8Error::StackUnderflow)?;
        self.sp = sp;
        Ok(self.frames[sp])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sp
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sp == 0
    }

    /// Occupied frames, bottom first.
    pub fn frames(&self) -> &[Address] {
        &self.frames[..self.sp]
    }

    pub fn clear(&mut self) {
        self.frames.fill(0);
        self.sp = 0;
    }
}

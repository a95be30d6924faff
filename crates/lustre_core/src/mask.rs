//! Mask pipeline and clip stack
//!
//! A mask draw runs only the rounded-rectangle edge test of the shape
//! compositor (no paint, no shadow) and writes the stencil buffer. Nested
//! clips are tracked as a stencil depth: content inside `n` clips is drawn
//! with stencil reference `n`.

use thiserror::Error;

use crate::edge::Edge;
use crate::geometry::Vec2;

/// Coverage below which a mask fragment leaves the stencil untouched
pub const MASK_THRESHOLD: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaskDecision {
    Keep { coverage: f32 },
    Discard,
}

impl MaskDecision {
    /// Whether the fragment updates a binary stencil
    pub fn writes_stencil(&self) -> bool {
        match self {
            MaskDecision::Keep { coverage } => *coverage >= MASK_THRESHOLD,
            MaskDecision::Discard => false,
        }
    }
}

/// Keep/discard decision for the mask silhouette at `local_offset`
pub fn mask_fragment(local_offset: Vec2, half_size: Vec2, radius: f32, feather: f32) -> MaskDecision {
    match Edge::silhouette(half_size, radius, feather).coverage(local_offset) {
        Some(coverage) => MaskDecision::Keep { coverage },
        None => MaskDecision::Discard,
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipError {
    #[error("clip stack underflow: pop without a matching push")]
    Underflow,
    #[error("clip stack overflow: stencil depth limited to {max}")]
    Overflow { max: u32 },
}

/// Nested stencil clip depth
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipStack {
    depth: u32,
}

impl ClipStack {
    /// Largest depth an 8-bit stencil can represent
    pub const MAX_DEPTH: u32 = u8::MAX as u32;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Stencil reference for content drawn at the current depth
    pub fn reference(&self) -> u32 {
        self.depth
    }

    /// Enter a clip. Returns the reference to draw the mask with (incrementing).
    pub fn push(&mut self) -> Result<u32, ClipError> {
        if self.depth >= Self::MAX_DEPTH {
            return Err(ClipError::Overflow {
                max: Self::MAX_DEPTH,
            });
        }
        let reference = self.depth;
        self.depth += 1;
        Ok(reference)
    }

    /// Leave a clip. Returns the reference to draw the mask with (decrementing).
    pub fn pop(&mut self) -> Result<u32, ClipError> {
        if self.depth == 0 {
            return Err(ClipError::Underflow);
        }
        let reference = self.depth;
        self.depth -= 1;
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_push_pop() {
        let mut clips = ClipStack::new();
        assert_eq!(clips.push(), Ok(0));
        assert_eq!(clips.push(), Ok(1));
        assert_eq!(clips.reference(), 2);
        assert_eq!(clips.pop(), Ok(2));
        assert_eq!(clips.pop(), Ok(1));
        assert_eq!(clips.depth(), 0);
        assert_eq!(clips.pop(), Err(ClipError::Underflow));
    }

    #[test]
    fn overflow_is_reported() {
        let mut clips = ClipStack::new();
        for _ in 0..ClipStack::MAX_DEPTH {
            clips.push().unwrap();
        }
        assert!(matches!(clips.push(), Err(ClipError::Overflow { .. })));
    }

    #[test]
    fn soft_mask_edge_threshold() {
        let half = Vec2::new(10.0, 10.0);
        let decision = mask_fragment(Vec2::ZERO, half, 4.0, 2.0);
        assert_eq!(decision, MaskDecision::Keep { coverage: 1.0 });
        assert!(decision.writes_stencil());

        // 1.5px outside a 2px feather: coverage 0.25
        let p = Vec2::new(6.0, 6.0) + Vec2::new(5.5, 0.0).rotate(std::f32::consts::FRAC_PI_4);
        let soft = mask_fragment(p, half, 4.0, 2.0);
        assert!(matches!(soft, MaskDecision::Keep { .. }));
        assert!(!soft.writes_stencil());
        assert_eq!(mask_fragment(Vec2::new(11.0, 0.0), half, 4.0, 2.0), MaskDecision::Discard);
    }
}

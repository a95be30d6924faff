//! Draw lists
//!
//! A [`DrawList`] records one frame: instance data for the shape and glyph
//! buffers plus the ordered commands that draw them. Clip masks are ordinary
//! shape instances drawn with the mask pipelines; every command carries the
//! stencil reference it runs with. Textured shapes name the registered
//! texture they sample with a [`TextureId`].

use std::ops::Range;

use lustre_core::{ClipError, ClipStack, GlyphInstance, ShapeInstance};

/// Handle to a color texture registered with a renderer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(u32);

impl TextureId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

/// One step of a frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawCommand {
    /// Draw a range of the shape buffer; `texture` is bound for the texture
    /// layer (a transparent placeholder when `None`)
    Shapes {
        instances: Range<u32>,
        reference: u32,
        texture: Option<TextureId>,
    },
    /// Draw a range of the glyph buffer
    Glyphs { instances: Range<u32>, reference: u32 },
    /// Increment the stencil inside the mask at `instance` of the shape buffer
    PushClip { instance: u32, reference: u32 },
    /// Decrement the stencil inside the mask at `instance` of the shape buffer
    PopClip { instance: u32, reference: u32 },
}

/// Instance data and commands for one frame
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    shapes: Vec<ShapeInstance>,
    glyphs: Vec<GlyphInstance>,
    commands: Vec<DrawCommand>,
    clips: ClipStack,
    clip_masks: Vec<u32>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape_instances(&self) -> &[ShapeInstance] {
        &self.shapes
    }

    pub fn glyph_instances(&self) -> &[GlyphInstance] {
        &self.glyphs
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Current clip nesting depth
    pub fn clip_depth(&self) -> u32 {
        self.clips.depth()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Reset for a new frame, keeping allocations
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.glyphs.clear();
        self.commands.clear();
        self.clips = ClipStack::new();
        self.clip_masks.clear();
    }

    /// Append untextured shapes; consecutive calls at the same clip depth merge
    pub fn shapes(&mut self, shapes: &[ShapeInstance]) -> &mut Self {
        self.push_shapes(shapes, None)
    }

    /// Append shapes whose texture layer samples `texture`
    pub fn textured_shapes(&mut self, texture: TextureId, shapes: &[ShapeInstance]) -> &mut Self {
        self.push_shapes(shapes, Some(texture))
    }

    /// Every texture referenced by a command, in first-use order
    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        let mut seen = Vec::new();
        self.commands.iter().filter_map(move |command| match command {
            DrawCommand::Shapes {
                texture: Some(id), ..
            } if !seen.contains(id) => {
                seen.push(*id);
                Some(*id)
            }
            _ => None,
        })
    }

    fn push_shapes(&mut self, shapes: &[ShapeInstance], texture: Option<TextureId>) -> &mut Self {
        if shapes.is_empty() {
            return self;
        }
        let start = self.shapes.len() as u32;
        self.shapes.extend_from_slice(shapes);
        let end = self.shapes.len() as u32;
        let reference = self.clips.reference();

        if let Some(DrawCommand::Shapes {
            instances,
            reference: r,
            texture: t,
        }) = self.commands.last_mut()
        {
            if *r == reference && *t == texture && instances.end == start {
                instances.end = end;
                return self;
            }
        }
        self.commands.push(DrawCommand::Shapes {
            instances: start..end,
            reference,
            texture,
        });
        self
    }

    /// Append glyphs; consecutive calls at the same clip depth merge
    pub fn glyphs(&mut self, glyphs: &[GlyphInstance]) -> &mut Self {
        if glyphs.is_empty() {
            return self;
        }
        let start = self.glyphs.len() as u32;
        self.glyphs.extend_from_slice(glyphs);
        let end = self.glyphs.len() as u32;
        let reference = self.clips.reference();

        if let Some(DrawCommand::Glyphs {
            instances,
            reference: r,
        }) = self.commands.last_mut()
        {
            if *r == reference && instances.end == start {
                instances.end = end;
                return self;
            }
        }
        self.commands.push(DrawCommand::Glyphs {
            instances: start..end,
            reference,
        });
        self
    }

    /// Restrict following draws to the silhouette of `mask`
    pub fn push_clip(&mut self, mask: ShapeInstance) -> Result<&mut Self, ClipError> {
        let reference = self.clips.push()?;
        let instance = self.shapes.len() as u32;
        self.shapes.push(mask);
        self.clip_masks.push(instance);
        self.commands
            .push(DrawCommand::PushClip { instance, reference });
        Ok(self)
    }

    /// Undo the innermost [`push_clip`](Self::push_clip)
    pub fn pop_clip(&mut self) -> Result<&mut Self, ClipError> {
        let reference = self.clips.pop()?;
        let instance = self.clip_masks.pop().ok_or(ClipError::Underflow)?;
        self.commands
            .push(DrawCommand::PopClip { instance, reference });
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> ShapeInstance {
        ShapeInstance::rect(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn consecutive_draws_merge() {
        let mut list = DrawList::new();
        list.shapes(&[rect(), rect()]).shapes(&[rect()]);
        assert_eq!(
            list.commands(),
            &[DrawCommand::Shapes {
                instances: 0..3,
                reference: 0,
                texture: None,
            }]
        );
    }

    #[test]
    fn texture_changes_split_draws() {
        let (a, b) = (TextureId::new(0), TextureId::new(1));
        let mut list = DrawList::new();
        list.textured_shapes(a, &[rect()])
            .textured_shapes(a, &[rect()])
            .textured_shapes(b, &[rect()])
            .shapes(&[rect()])
            .textured_shapes(a, &[rect()]);
        assert_eq!(
            list.commands(),
            &[
                DrawCommand::Shapes {
                    instances: 0..2,
                    reference: 0,
                    texture: Some(a),
                },
                DrawCommand::Shapes {
                    instances: 2..3,
                    reference: 0,
                    texture: Some(b),
                },
                DrawCommand::Shapes {
                    instances: 3..4,
                    reference: 0,
                    texture: None,
                },
                DrawCommand::Shapes {
                    instances: 4..5,
                    reference: 0,
                    texture: Some(a),
                },
            ]
        );
        assert_eq!(list.textures().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn clip_commands_carry_references() {
        let mut list = DrawList::new();
        list.shapes(&[rect()]);
        list.push_clip(rect()).unwrap();
        list.shapes(&[rect()]);
        list.glyphs(&[GlyphInstance::default()]);
        list.pop_clip().unwrap();
        list.shapes(&[rect()]);

        assert_eq!(
            list.commands(),
            &[
                DrawCommand::Shapes {
                    instances: 0..1,
                    reference: 0,
                    texture: None,
                },
                DrawCommand::PushClip {
                    instance: 1,
                    reference: 0
                },
                DrawCommand::Shapes {
                    instances: 2..3,
                    reference: 1,
                    texture: None,
                },
                DrawCommand::Glyphs {
                    instances: 0..1,
                    reference: 1
                },
                DrawCommand::PopClip {
                    instance: 1,
                    reference: 1
                },
                DrawCommand::Shapes {
                    instances: 3..4,
                    reference: 0,
                    texture: None,
                },
            ]
        );
        assert_eq!(list.clip_depth(), 0);
        assert_eq!(list.shape_instances().len(), 4);
    }

    #[test]
    fn unbalanced_pop_errors() {
        let mut list = DrawList::new();
        assert_eq!(list.pop_clip().err(), Some(ClipError::Underflow));
    }

    #[test]
    fn clear_resets() {
        let mut list = DrawList::new();
        list.push_clip(rect()).unwrap();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.clip_depth(), 0);
        assert!(list.shape_instances().is_empty());
    }
}

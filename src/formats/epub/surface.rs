//! Off-screen layout surface for EPUB spine items
//!
//! A spine item is mounted on the surface, left to settle, then captured.
//! Every in-flight item gets its own slot so a batch can lay out several
//! items at once. Disposing the surface drops all mounted content and
//! rejects further mounts.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::EpubConfig;
use crate::document::{DocumentError, DocumentResult};

/// Fixed layout box, in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutBox {
    pub width: f32,
    pub height: f32,
    /// Base font size
    pub em: f32,
}

impl LayoutBox {
    pub fn from_config(config: &EpubConfig) -> Self {
        Self {
            width: config.layout_width,
            height: config.layout_height,
            em: config.em,
        }
    }
}

pub struct LayoutSurface {
    layout: LayoutBox,
    state: Mutex<SurfaceState>,
}

#[derive(Default)]
struct SurfaceState {
    slots: HashMap<usize, Arc<Vec<u8>>>,
    disposed: bool,
}

impl LayoutSurface {
    pub fn new(layout: LayoutBox) -> Arc<Self> {
        Arc::new(Self {
            layout,
            state: Mutex::new(SurfaceState::default()),
        })
    }

    pub fn layout(&self) -> LayoutBox {
        self.layout
    }

    /// Place an item's content on the surface
    ///
    /// The slot is released when the returned guard drops.
    pub fn mount(self: &Arc<Self>, index: usize, content: Arc<Vec<u8>>) -> DocumentResult<Mounted> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(DocumentError::RenderError(
                "Layout surface already disposed".to_string(),
            ));
        }
        state.slots.insert(index, content);

        Ok(Mounted {
            surface: Arc::clone(self),
            index,
        })
    }

    /// Number of items currently mounted
    pub fn mounted(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Drop every mounted item and refuse new ones
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        state.slots.clear();
        state.disposed = true;
    }
}

/// An item mounted on a [`LayoutSurface`]
pub struct Mounted {
    surface: Arc<LayoutSurface>,
    index: usize,
}

impl Mounted {
    /// Content ready for capture; fails when the surface was disposed meanwhile
    pub fn content(&self) -> DocumentResult<Arc<Vec<u8>>> {
        self.surface
            .state
            .lock()
            .slots
            .get(&self.index)
            .cloned()
            .ok_or_else(|| {
                DocumentError::RenderError(format!(
                    "Item {} is no longer on the layout surface",
                    self.index + 1
                ))
            })
    }
}

impl Drop for Mounted {
    fn drop(&mut self) {
        self.surface.state.lock().slots.remove(&self.index);
    }
}

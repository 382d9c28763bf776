//! Presentation-side view state
//!
//! Transient, owned by whatever draws the flip book. The only part the core
//! cares about is rotation: [`ViewState::rotate`] returns the new rotation,
//! which the caller hands to [`ViewerSession::set_rotation`](crate::ViewerSession::set_rotation).

use serde::Serialize;

use crate::document::{Chapter, Rotation};

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 5.0;
pub const ZOOM_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// 0-based index of the page on screen
    pub current_page: usize,
    pub zoom: f32,
    pub rotation: Rotation,
    pub ui_visible: bool,
    pub theme: Theme,
    pub chapters_visible: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            current_page: 0,
            zoom: 1.0,
            rotation: Rotation::Deg0,
            ui_visible: true,
            theme: Theme::Dark,
            chapters_visible: false,
        }
    }
}

impl ViewState {
    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - ZOOM_STEP);
    }

    /// Apply a pinch gesture's scale factor to the current zoom
    pub fn pinch(&mut self, scale_factor: f32) {
        if scale_factor.is_finite() && scale_factor > 0.0 {
            self.set_zoom(self.zoom * scale_factor);
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_nan() {
            return;
        }
        // Keep repeated steps from drifting (1.0 + 0.1 * 3 == 1.3)
        let rounded = (zoom * 100.0).round() / 100.0;
        self.zoom = rounded.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Zoom as a whole percentage for display
    pub fn zoom_percent(&self) -> u32 {
        (self.zoom * 100.0).round() as u32
    }

    /// Next clockwise quarter turn
    pub fn rotate(&mut self) -> Rotation {
        self.rotation = self.rotation.rotate_cw();
        self.rotation
    }

    /// Jump to a 1-based page; out-of-range numbers are ignored
    pub fn go_to_page(&mut self, number: usize, total_pages: usize) -> bool {
        if number >= 1 && number <= total_pages {
            self.current_page = number - 1;
            true
        } else {
            false
        }
    }

    /// Parse typed page input and jump to it
    pub fn submit_page_input(&mut self, input: &str, total_pages: usize) -> bool {
        match input.trim().parse::<usize>() {
            Ok(number) => self.go_to_page(number, total_pages),
            Err(_) => false,
        }
    }

    pub fn next_page(&mut self, total_pages: usize) -> bool {
        self.go_to_page(self.current_page + 2, total_pages)
    }

    pub fn previous_page(&mut self, total_pages: usize) -> bool {
        match self.current_page {
            0 => false,
            current => self.go_to_page(current, total_pages),
        }
    }

    /// Page number shown in the page input box
    pub fn page_label(&self) -> String {
        (self.current_page + 1).to_string()
    }

    pub fn toggle_ui(&mut self) {
        self.ui_visible = !self.ui_visible;
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
    }

    /// The chapter panel only opens when there are chapters to show
    pub fn toggle_chapters(&mut self, chapters: &[Chapter]) -> bool {
        if chapters.is_empty() {
            self.chapters_visible = false;
        } else {
            self.chapters_visible = !self.chapters_visible;
        }
        self.chapters_visible
    }

    /// Jump to a chapter's page and close the panel
    pub fn open_chapter(&mut self, chapter: &Chapter, total_pages: usize) -> bool {
        self.chapters_visible = false;
        self.go_to_page(chapter.page, total_pages)
    }

    /// Forget per-document position when a new document loads
    pub fn reset_for_document(&mut self) {
        self.current_page = 0;
        self.chapters_visible = false;
    }
}

//! Photo gallery view state. Selecting a photo only changes what is shown.

use crate::session::PhotoCapture;

#[derive(Debug, Clone)]
pub struct PhotoGallery {
    photos: Vec<PhotoCapture>,
    selected: Option<usize>,
}

impl PhotoGallery {
    pub fn new(photos: Vec<PhotoCapture>) -> Self {
        Self {
            photos,
            selected: None,
        }
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn photos(&self) -> &[PhotoCapture] {
        &self.photos
    }

    pub fn photo(&self, index: usize) -> Option<&PhotoCapture> {
        self.photos.get(index)
    }

    /// Index and photo shown full screen, if any.
    pub fn selected(&self) -> Option<(usize, &PhotoCapture)> {
        self.selected.map(|i| (i, &self.photos[i]))
    }

    pub fn is_full_screen(&self) -> bool {
        self.selected.is_some()
    }

    /// Show `index` full screen. Out of range leaves the selection unchanged.
    pub fn select(&mut self, index: usize) -> Option<&PhotoCapture> {
        if index >= self.photos.len() {
            return None;
        }
        self.selected = Some(index);
        self.photos.get(index)
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Step forward in full-screen mode, stopping at the last photo.
    pub fn next(&mut self) -> Option<&PhotoCapture> {
        let current = self.selected?;
        let next = (current + 1).min(self.photos.len().saturating_sub(1));
        self.select(next)
    }

    /// Step back in full-screen mode, stopping at the first photo.
    pub fn previous(&mut self) -> Option<&PhotoCapture> {
        let current = self.selected?;
        self.select(current.saturating_sub(1))
    }
}

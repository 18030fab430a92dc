use crate::design::{DesignDocument, Page};

/// Which design is on screen and which page of it. Navigation clamps at both
/// ends and never wraps.
#[derive(Debug, Clone, Default)]
pub struct PreviewState {
    document: Option<DesignDocument>,
    page_index: usize,
    visible: bool,
}

impl PreviewState {
    /// Shows `document` from its first page.
    pub fn activate(&mut self, document: DesignDocument) {
        self.document = Some(document);
        self.page_index = 0;
        self.visible = true;
    }

    pub fn clear(&mut self) {
        self.document = None;
        self.page_index = 0;
        self.visible = false;
    }

    /// Hides the panel but keeps the document so it can be reopened.
    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn reopen(&mut self) -> bool {
        self.visible = self.document.is_some();
        self.visible
    }

    pub fn is_visible(&self) -> bool {
        self.visible && self.document.is_some()
    }

    pub fn document(&self) -> Option<&DesignDocument> {
        self.document.as_ref()
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, DesignDocument::page_count)
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.document.as_ref()?.pages.get(self.page_index)
    }

    pub fn can_go_back(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.page_index + 1 < self.page_count()
    }

    pub fn next_page(&mut self) {
        if self.can_go_forward() {
            self.page_index += 1;
        }
    }

    pub fn previous_page(&mut self) {
        if self.can_go_back() {
            self.page_index -= 1;
        }
    }

    pub fn go_to(&mut self, index: usize) {
        self.page_index = index.min(self.page_count().saturating_sub(1));
    }
}

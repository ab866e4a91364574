use crate::domain::{KeySequence, Recipient, RecipientKey, Row};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Client-owned, editable view over one uploaded batch of recipients.
///
/// Edits only ever touch the working copy; the pristine copy is kept
/// so that `reset` can bring back exactly what the server returned.
#[derive(Debug)]
pub struct RecipientSet {
    pristine: Vec<Row>,
    working: Vec<Row>,
    filter_text: String,
    page: usize,
    page_size: usize,
    keys: KeySequence,
}

impl Default for RecipientSet {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl RecipientSet {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            pristine: Vec::new(),
            working: Vec::new(),
            filter_text: String::new(),
            page: 1,
            page_size: page_size.max(1),
            keys: KeySequence::default(),
        }
    }

    /// Replace both copies with a freshly uploaded batch.
    pub fn load(&mut self, recipients: Vec<Recipient>) {
        self.pristine = self.keys.assign(recipients);
        self.working = self.pristine.clone();
        self.filter_text.clear();
        self.page = 1;
    }

    /// Rows of the working copy whose email contains `text`, ignoring case.
    pub fn filter(&self, text: &str) -> Vec<&Row> {
        let needle = text.to_lowercase();
        self.working
            .iter()
            .filter(|row| needle.is_empty() || row.recipient.email.to_lowercase().contains(&needle))
            .collect()
    }

    /// Drop a row from the working copy. Returns whether a row was removed.
    pub fn remove(&mut self, key: RecipientKey) -> bool {
        let before = self.working.len();
        self.working.retain(|row| row.key != key);
        let removed = self.working.len() != before;
        if removed {
            let visible = self.filter(&self.filter_text).len();
            self.page = clamp_page(visible, self.page, self.page_size);
        }
        removed
    }

    pub fn reset(&mut self) {
        self.working = self.pristine.clone();
        self.filter_text.clear();
        self.page = 1;
    }

    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.filter_text = text.into();
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        let visible = self.filter(&self.filter_text).len();
        self.page = clamp_page(visible, page, self.page_size);
    }

    /// The rows currently on screen: filtered with the stored text, then paged.
    pub fn visible(&self) -> Vec<&Row> {
        let filtered = self.filter(&self.filter_text);
        paginate(&filtered, self.page, self.page_size).to_vec()
    }

    pub fn page_count(&self) -> usize {
        page_count(self.filter(&self.filter_text).len(), self.page_size)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn rows(&self) -> &[Row] {
        &self.working
    }

    pub fn pristine(&self) -> &[Row] {
        &self.pristine
    }

    pub fn len(&self) -> usize {
        self.working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working.is_empty()
    }

    /// Owned copy of the working rows, in order, for a send request.
    pub fn recipients(&self) -> Vec<Recipient> {
        self.working.iter().map(|row| row.recipient.clone()).collect()
    }
}

/// Slice `[(page-1)*page_size, page*page_size)` of `rows`, with `page`
/// clamped to the pages that actually exist.
pub fn paginate<T>(rows: &[T], page: usize, page_size: usize) -> &[T] {
    let page_size = page_size.max(1);
    let page = clamp_page(rows.len(), page, page_size);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(rows.len());
    &rows[start.min(rows.len())..end]
}

pub fn page_count(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1)).max(1)
}

pub fn clamp_page(count: usize, page: usize, page_size: usize) -> usize {
    page.clamp(1, page_count(count, page_size))
}

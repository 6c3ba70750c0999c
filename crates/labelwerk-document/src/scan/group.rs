// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document grouping: partition a document into the page runs between
// separator pages, and track which runs have been printed.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use labelwerk_core::error::Result;
use labelwerk_core::types::{GroupId, PageSpan};
use tracing::{debug, info, instrument, warn};

use crate::render::PageRenderer;

/// A contiguous run of pages between separators.
#[derive(Debug, Clone)]
pub struct DocumentGroup {
    pub id: GroupId,
    pub start_page: u32,
    pub end_page: u32,
    pub page_count: u32,
    /// Thumbnail of the group's last page, if it rendered.
    pub preview: Option<DynamicImage>,
}

impl DocumentGroup {
    fn new(start_page: u32, end_page: u32, preview: Option<DynamicImage>) -> Self {
        Self {
            id: GroupId::new(),
            start_page,
            end_page,
            page_count: end_page - start_page + 1,
            preview,
        }
    }
}

impl PageSpan for DocumentGroup {
    fn start_page(&self) -> u32 {
        self.start_page
    }

    fn end_page(&self) -> u32 {
        self.end_page
    }
}

/// Print state of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintState {
    pub is_printed: bool,
    pub printed_at: Option<DateTime<Utc>>,
}

/// Owns the groups of the current document and their print state.
pub struct DocumentGrouper {
    preview_dpi: u32,
    groups: Vec<DocumentGroup>,
    print_state: HashMap<GroupId, PrintState>,
}

impl DocumentGrouper {
    pub fn new(preview_dpi: u32) -> Self {
        Self {
            preview_dpi,
            groups: Vec::new(),
            print_state: HashMap::new(),
        }
    }

    /// Split `[1, total_pages]` into the runs between `separator_pages`.
    ///
    /// Separators are sorted and de-duplicated first; those beyond the last
    /// page are ignored. Adjacent separators and a separator on page 1 produce
    /// no empty groups. Each group gets a preview of its last page; a preview
    /// that fails to render leaves `preview` empty. Starts a new session:
    /// previous groups and their print state are discarded.
    #[instrument(skip_all, fields(path = %path.display(), separators = separator_pages.len()))]
    pub fn create_groups(
        &mut self,
        renderer: &dyn PageRenderer,
        path: &Path,
        separator_pages: &[u32],
    ) -> Result<&[DocumentGroup]> {
        let total_pages = renderer.page_count(path)?;

        self.groups.clear();
        self.print_state.clear();

        let mut separators = separator_pages.to_vec();
        separators.sort_unstable();
        separators.dedup();

        let mut runs = Vec::new();
        let mut cursor = 1u32;
        for &separator in separators.iter().filter(|&&p| p >= 1 && p <= total_pages) {
            if separator > cursor {
                runs.push((cursor, separator - 1));
            }
            cursor = separator + 1;
        }
        if cursor <= total_pages {
            runs.push((cursor, total_pages));
        }

        for (start, end) in runs {
            let preview = match renderer.render_page(path, end, self.preview_dpi) {
                Ok(preview) => preview,
                Err(err) => {
                    warn!(page = end, error = %err, "Preview render failed");
                    None
                }
            };
            let group = DocumentGroup::new(start, end, preview);
            debug!(id = %group.id, start, end, "Group created");
            self.print_state.insert(group.id, PrintState::default());
            self.groups.push(group);
        }

        info!(groups = self.groups.len(), total_pages, "Document grouped");
        Ok(&self.groups)
    }

    /// Groups of the current session, in page order.
    pub fn groups(&self) -> &[DocumentGroup] {
        &self.groups
    }

    /// Groups of the current session together with their print state.
    pub fn groups_with_state(&self) -> impl Iterator<Item = (&DocumentGroup, PrintState)> {
        self.groups
            .iter()
            .map(|group| (group, self.print_state(group.id).unwrap_or_default()))
    }

    // -- Print state ----------------------------------------------------------

    /// Record that a group was printed now. Unknown ids are ignored and
    /// return `false`.
    pub fn mark_as_printed(&mut self, id: GroupId) -> bool {
        match self.print_state.get_mut(&id) {
            Some(state) => {
                state.is_printed = true;
                state.printed_at = Some(Utc::now());
                info!(%id, "Group marked as printed");
                true
            }
            None => {
                debug!(%id, "mark_as_printed on unknown group");
                false
            }
        }
    }

    pub fn is_printed(&self, id: GroupId) -> bool {
        self.print_state.get(&id).is_some_and(|s| s.is_printed)
    }

    pub fn print_state(&self, id: GroupId) -> Option<PrintState> {
        self.print_state.get(&id).copied()
    }

    /// Reset every group to not printed.
    pub fn clear_print_status(&mut self) {
        for state in self.print_state.values_mut() {
            *state = PrintState::default();
        }
    }
}

use shipdesk_domain::FilterGeneration;
use tracing::trace;

use crate::page_sizer::PageGeometry;

/// Window of one list request. Page indices start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchCursor {
    pub page_index: usize,
    pub offset: usize,
    pub limit: usize,
}

impl FetchCursor {
    pub fn is_first_page(&self) -> bool {
        self.page_index <= 1
    }
}

/// Larger first page, smaller continuation pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlanner {
    initial_page_size: usize,
    continuation_page_size: usize,
}

impl FetchPlanner {
    pub fn new(initial_page_size: usize, continuation_page_size: usize) -> Self {
        Self {
            initial_page_size: initial_page_size.max(1),
            continuation_page_size: continuation_page_size.max(1),
        }
    }

    pub fn from_geometry(geometry: PageGeometry) -> Self {
        Self::new(geometry.initial_page_size, geometry.continuation_page_size)
    }

    pub fn initial_page_size(&self) -> usize {
        self.initial_page_size
    }

    pub fn continuation_page_size(&self) -> usize {
        self.continuation_page_size
    }

    pub fn plan(
        &self,
        generation: FilterGeneration,
        accumulated_count: usize,
        page_index: usize,
    ) -> FetchCursor {
        let page_index = page_index.max(1);
        let cursor = if page_index == 1 {
            FetchCursor {
                page_index,
                offset: 0,
                limit: self.initial_page_size,
            }
        } else {
            FetchCursor {
                page_index,
                offset: self.initial_page_size
                    + (page_index - 2) * self.continuation_page_size,
                limit: self.continuation_page_size,
            }
        };
        trace!(
            generation = generation.value(),
            accumulated_count,
            page_index,
            offset = cursor.offset,
            limit = cursor.limit,
            "planned shipment fetch"
        );
        cursor
    }
}

use studio_types::feed::PAGE_SIZE;

/// A (page, index) position in the voting view.
pub type Position = (u32, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub index: usize,
    pub previous: Option<Position>,
    pub next: Option<Position>,
}

/// Step through one page of captions one at a time. At either end of a
/// paginated page the step crosses into the neighbouring page; an
/// unpaginated result set has no neighbours.
pub fn navigate(page: u32, requested_index: i64, row_count: usize, paginated: bool) -> Navigation {
    let last = row_count.saturating_sub(1);
    let index = requested_index.clamp(0, last as i64) as usize;
    let page_size = PAGE_SIZE as usize;

    let previous = if index > 0 {
        Some((page, index - 1))
    } else if paginated && page > 1 {
        Some((page - 1, page_size - 1))
    } else {
        None
    };

    let next = if row_count > 0 && index < last {
        Some((page, index + 1))
    } else if paginated && row_count == page_size {
        Some((page + 1, 0))
    } else {
        None
    };

    Navigation {
        index,
        previous,
        next,
    }
}

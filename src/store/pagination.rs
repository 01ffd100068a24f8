use crate::store::models::{NotificationRecord, Page, PageQuery};

/// Pure pagination over a log snapshot.
///
/// The unread count is taken over the full log before the filter is
/// applied, so it is identical across `read`/`unread`/unfiltered listings
/// of the same log state. Filtering and slicing never reorder records; an
/// out-of-range page yields an empty page rather than an error.
pub fn paginate(log: &[NotificationRecord], query: &PageQuery) -> Page {
    let unread_count = log.iter().filter(|n| !n.read).count() as u64;

    let filtered: Vec<&NotificationRecord> =
        log.iter().filter(|n| query.filter.matches(n)).collect();

    let total_matching = filtered.len() as u64;
    let total_pages = (total_matching as f64 / query.limit as f64).ceil() as u64;

    let start = ((query.page - 1) * query.limit) as usize;
    let items = if start >= filtered.len() {
        Vec::new()
    } else {
        let end = (start + query.limit as usize).min(filtered.len());
        filtered[start..end].iter().map(|n| (*n).clone()).collect()
    };

    Page {
        total_matching,
        unread_count,
        current_page: query.page,
        total_pages,
        items,
    }
}

/// Pagination state for one search query.
///
/// `since_id` is the exclusive lower bound sent with every request and
/// only advances between polling passes, so one pass sees a stable
/// window. `max_id` is the exclusive upper bound walking backward through
/// pages within a single pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCursor {
    since_id: Option<u64>,
    next_since_id: Option<u64>,
    max_id: Option<u64>,
}

impl QueryCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since_id(&self) -> Option<u64> {
        self.since_id
    }

    pub fn max_id(&self) -> Option<u64> {
        self.max_id
    }

    pub fn begin_pass(&mut self) {
        self.max_id = None;
    }

    /// Track one result id: remember the highest id seen for the next
    /// pass and step the backward bound below the lowest id seen.
    pub fn observe(&mut self, id: u64) {
        let candidate = id.saturating_add(1);
        if self.next_since_id.map_or(true, |next| next < candidate) {
            self.next_since_id = Some(candidate);
        }
        let backward = id.saturating_sub(1);
        if self.max_id.map_or(true, |max| max > backward) {
            self.max_id = Some(backward);
        }
    }

    /// Promote the highest id seen so the next pass starts past it.
    pub fn end_pass(&mut self) {
        if let Some(next) = self.next_since_id {
            self.since_id = Some(next);
        }
        self.max_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_id_only_advances_between_passes() {
        let mut cursor = QueryCursor::new();
        cursor.begin_pass();
        cursor.observe(500);
        cursor.observe(400);

        // Mid-pass, requests still use the old lower bound.
        assert_eq!(cursor.since_id(), None);
        assert_eq!(cursor.max_id(), Some(399));

        cursor.end_pass();
        assert_eq!(cursor.since_id(), Some(501));
        assert_eq!(cursor.max_id(), None);
    }

    #[test]
    fn max_id_walks_backward_within_a_pass() {
        let mut cursor = QueryCursor::new();
        cursor.begin_pass();
        cursor.observe(300);
        assert_eq!(cursor.max_id(), Some(299));
        cursor.observe(250);
        assert_eq!(cursor.max_id(), Some(249));
        // A higher id later in the page never moves the bound forward.
        cursor.observe(280);
        assert_eq!(cursor.max_id(), Some(249));
    }

    #[test]
    fn highest_id_survives_across_pages_of_one_pass() {
        let mut cursor = QueryCursor::new();
        cursor.begin_pass();
        cursor.observe(900);
        cursor.observe(800);
        cursor.observe(700);
        cursor.end_pass();

        cursor.begin_pass();
        cursor.observe(950);
        cursor.end_pass();
        assert_eq!(cursor.since_id(), Some(951));
    }

    #[test]
    fn empty_pass_leaves_cursor_unchanged() {
        let mut cursor = QueryCursor::new();
        cursor.begin_pass();
        cursor.end_pass();
        assert_eq!(cursor.since_id(), None);
    }
}

/// Settles raw search-box input into a filter query.
///
/// Every keystroke restarts the quiet interval; a value is emitted only after
/// the input has been still for the whole interval and differs from the last
/// emitted value. Time is passed in by the caller (milliseconds).
#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    quiet_ms: u64,
    raw: Option<(String, u64)>,
    settled: String,
}

impl SearchDebouncer {
    pub fn new(quiet_ms: u64) -> Self {
        Self {
            quiet_ms,
            raw: None,
            settled: String::new(),
        }
    }

    /// The last value emitted by [`SearchDebouncer::poll`]
    pub fn settled(&self) -> &str {
        &self.settled
    }

    /// Record raw input received at `now_ms`
    pub fn input(&mut self, raw: &str, now_ms: u64) {
        self.raw = Some((raw.to_string(), now_ms));
    }

    /// Emit the settled query if the quiet interval has elapsed and it changed
    pub fn poll(&mut self, now_ms: u64) -> Option<String> {
        let (_, at) = self.raw.as_ref()?;
        if now_ms.saturating_sub(*at) < self.quiet_ms {
            return None;
        }
        let (value, _) = self.raw.take()?;
        let value = value.trim().to_string();
        if value == self.settled {
            return None;
        }
        self.settled = value.clone();
        Some(value)
    }

    /// Align the settled value with a query applied directly (bypassing input)
    pub fn force(&mut self, query: &str) {
        self.raw = None;
        self.settled = query.trim().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_after_quiet_interval() {
        let mut debouncer = SearchDebouncer::new(300);
        debouncer.input("ac", 0);
        assert_eq!(debouncer.poll(100), None);
        debouncer.input("acme", 200);
        assert_eq!(debouncer.poll(400), None);
        assert_eq!(debouncer.poll(500), Some("acme".to_string()));
        assert_eq!(debouncer.poll(900), None);
        assert_eq!(debouncer.settled(), "acme");
    }

    #[test]
    fn test_unchanged_value_is_not_reemitted() {
        let mut debouncer = SearchDebouncer::new(300);
        debouncer.input("acme", 0);
        assert_eq!(debouncer.poll(300), Some("acme".to_string()));

        debouncer.input("acme ", 400);
        assert_eq!(debouncer.poll(800), None);

        debouncer.input("", 900);
        assert_eq!(debouncer.poll(1_200), Some(String::new()));
    }

    #[test]
    fn test_force_suppresses_pending_input() {
        let mut debouncer = SearchDebouncer::new(300);
        debouncer.input("ac", 0);
        debouncer.force("globex");
        assert_eq!(debouncer.poll(1_000), None);
        assert_eq!(debouncer.settled(), "globex");
    }
}

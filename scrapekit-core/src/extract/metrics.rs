use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMetrics {
    pub pages_visited: u64,
    pub fields_extracted: u64,
    pub field_failures: u64,
    pub items_extracted: u64,
    pub scrolls_performed: u64,
}

impl ExtractionMetrics {
    pub fn record_page(&mut self) {
        self.pages_visited = self.pages_visited.saturating_add(1);
    }

    pub fn record_field(&mut self, success: bool) {
        if success {
            self.fields_extracted = self.fields_extracted.saturating_add(1);
        } else {
            self.field_failures = self.field_failures.saturating_add(1);
        }
    }

    pub fn record_item(&mut self) {
        self.items_extracted = self.items_extracted.saturating_add(1);
    }

    pub fn record_scroll(&mut self) {
        self.scrolls_performed = self.scrolls_performed.saturating_add(1);
    }

    pub fn field_success_rate(&self) -> f64 {
        let attempts = self.fields_extracted + self.field_failures;
        if attempts == 0 {
            0.0
        } else {
            (self.fields_extracted as f64 / attempts as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_counts_failures() {
        let mut metrics = ExtractionMetrics::default();
        assert_eq!(metrics.field_success_rate(), 0.0);
        metrics.record_field(true);
        metrics.record_field(true);
        metrics.record_field(true);
        metrics.record_field(false);
        assert_eq!(metrics.field_success_rate(), 75.0);
    }
}

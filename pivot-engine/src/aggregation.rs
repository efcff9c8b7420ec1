//! FILENAME: pivot-engine/src/aggregation.rs
//! Null-safe aggregation of raw attribute values.
//!
//! Empty values (null, blank text) never take part in a reduction. Numeric
//! aggregations over a set without any number produce `None`; `count` counts
//! the non-empty values and is always a number.

use data_model::{numeric_value, Constraint, DataValue};

use crate::definition::AggregationType;
use crate::view::PivotValue;

/// Accumulator for one aggregated cell.
#[derive(Debug, Clone, Default)]
pub struct AggregateAccumulator {
    pub sum: f64,
    /// Non-empty values seen.
    pub count: u64,
    pub count_numbers: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    numbers: Vec<f64>,
    distinct: Vec<DataValue>,
}

impl AggregateAccumulator {
    pub fn new() -> Self {
        AggregateAccumulator::default()
    }

    /// Adds a raw value, reading numbers through the attribute's constraint.
    pub fn add(&mut self, value: &DataValue, constraint: Option<&Constraint>) {
        if value.is_empty() {
            return;
        }
        self.count += 1;

        if !self.distinct.contains(value) {
            self.distinct.push(value.clone());
        }
        if let Some(number) = numeric_value(value, constraint) {
            self.add_number(number);
        }
    }

    fn add_number(&mut self, value: f64) {
        self.count_numbers += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.numbers.push(value);
    }

    /// Computes the final aggregate value.
    pub fn compute(&self, aggregation: AggregationType) -> Option<PivotValue> {
        let number = match aggregation {
            AggregationType::Count => Some(self.count as f64),
            AggregationType::Sum => (self.count_numbers > 0).then_some(self.sum),
            AggregationType::Avg => {
                (self.count_numbers > 0).then(|| self.sum / (self.count_numbers as f64))
            }
            AggregationType::Min => self.min,
            AggregationType::Max => self.max,
            AggregationType::Median => self.median(),
            AggregationType::Unique | AggregationType::Join => {
                return (!self.distinct.is_empty())
                    .then(|| PivotValue::Values(self.distinct.clone()));
            }
        };
        number.map(PivotValue::Number)
    }

    fn median(&self) -> Option<f64> {
        if self.numbers.is_empty() {
            return None;
        }
        let mut sorted = self.numbers.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let middle = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[middle - 1] + sorted[middle]) / 2.0)
        } else {
            Some(sorted[middle])
        }
    }
}

/// Aggregates a sequence of raw values.
pub fn aggregate<'a>(
    aggregation: AggregationType,
    values: impl IntoIterator<Item = &'a DataValue>,
    constraint: Option<&Constraint>,
) -> Option<PivotValue> {
    let mut accumulator = AggregateAccumulator::new();
    for value in values {
        accumulator.add(value, constraint);
    }
    accumulator.compute(aggregation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[Option<f64>]) -> Vec<DataValue> {
        values
            .iter()
            .map(|v| v.map_or(DataValue::Null, DataValue::Number))
            .collect()
    }

    fn number(aggregation: AggregationType, values: &[DataValue]) -> Option<f64> {
        aggregate(aggregation, values, None).and_then(|v| v.as_number())
    }

    #[test]
    fn test_null_safe_reductions() {
        let values = numbers(&[Some(2.0), Some(4.0), None, Some(6.0)]);
        assert_eq!(number(AggregationType::Sum, &values), Some(12.0));
        assert_eq!(number(AggregationType::Count, &values), Some(3.0));
        assert_eq!(number(AggregationType::Avg, &values), Some(4.0));
        assert_eq!(number(AggregationType::Min, &values), Some(2.0));
        assert_eq!(number(AggregationType::Max, &values), Some(6.0));
        assert_eq!(number(AggregationType::Median, &values), Some(4.0));
    }

    #[test]
    fn test_all_null_is_undefined() {
        let values = numbers(&[None, None]);
        assert_eq!(aggregate(AggregationType::Min, &values, None), None);
        assert_eq!(aggregate(AggregationType::Sum, &values, None), None);
        assert_eq!(aggregate(AggregationType::Unique, &values, None), None);
        assert_eq!(number(AggregationType::Count, &values), Some(0.0));
    }

    #[test]
    fn test_median_of_even_count() {
        let values = numbers(&[Some(9.0), Some(1.0), Some(3.0), Some(5.0)]);
        assert_eq!(number(AggregationType::Median, &values), Some(4.0));
    }

    #[test]
    fn test_count_includes_text_but_sum_ignores_it() {
        let values = vec![DataValue::text("abc"), DataValue::Number(2.0), DataValue::text(" ")];
        assert_eq!(number(AggregationType::Count, &values), Some(2.0));
        assert_eq!(number(AggregationType::Sum, &values), Some(2.0));
    }

    #[test]
    fn test_unique_keeps_first_seen_order() {
        let values = vec![
            DataValue::text("b"),
            DataValue::text("a"),
            DataValue::Null,
            DataValue::text("b"),
        ];
        assert_eq!(
            aggregate(AggregationType::Join, &values, None),
            Some(PivotValue::Values(vec![DataValue::text("b"), DataValue::text("a")]))
        );
    }

    #[test]
    fn test_percentage_constraint_reads_percent_text() {
        let constraint = Constraint::Percentage { decimals: None };
        let values = vec![DataValue::text("50%"), DataValue::Number(0.25)];
        let sum = aggregate(AggregationType::Sum, &values, Some(&constraint));
        assert_eq!(sum, Some(PivotValue::Number(0.75)));
    }
}

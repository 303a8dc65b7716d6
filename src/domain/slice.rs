//! Time slices delivered to `on_data`.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::data::{BaseData, DataKind};
use super::symbol::Symbol;

/// All data delivered at one timestamp, grouped by symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub time: NaiveDateTime,
    entries: BTreeMap<Symbol, Vec<BaseData>>,
}

impl Slice {
    pub fn new(time: NaiveDateTime) -> Self {
        Slice {
            time,
            entries: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, data: BaseData) {
        self.entries
            .entry(data.symbol().clone())
            .or_default()
            .push(data);
    }

    /// Latest point of type `T` for every symbol that has one.
    pub fn get<T: DataKind>(&self) -> BTreeMap<&Symbol, &T> {
        self.entries
            .iter()
            .filter_map(|(symbol, points)| {
                points
                    .iter()
                    .rev()
                    .find_map(T::from_data)
                    .map(|item| (symbol, item))
            })
            .collect()
    }

    pub fn get_for<T: DataKind>(&self, symbol: &Symbol) -> Option<&T> {
        self.entries
            .get(symbol)
            .and_then(|points| points.iter().rev().find_map(T::from_data))
    }

    pub fn contains_key(&self, symbol: &Symbol) -> bool {
        self.entries.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BaseData> {
        self.entries.values().flatten()
    }

    /// Number of data points, not symbols.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

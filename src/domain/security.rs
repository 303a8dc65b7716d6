//! Securities, subscriptions and per-security data cache.

use std::collections::{BTreeMap, HashMap};

use super::data::{BaseData, DataKind, DataType};
use super::resolution::Resolution;
use super::symbol::Symbol;

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub symbol: Symbol,
    pub data_type: DataType,
    pub resolution: Resolution,
}

/// Latest delivered point per data type.
#[derive(Debug, Clone, Default)]
pub struct SecurityCache {
    latest: HashMap<DataType, BaseData>,
    price: Option<f64>,
}

impl SecurityCache {
    pub fn store(&mut self, data: &BaseData) {
        if let Some(price) = data.price() {
            self.price = Some(price);
        }
        self.latest.insert(data.data_type(), data.clone());
    }

    pub fn get(&self, data_type: DataType) -> Option<&BaseData> {
        self.latest.get(&data_type)
    }

    pub fn get_data<T: DataKind>(&self) -> Option<&T> {
        self.get(T::DATA_TYPE).and_then(T::from_data)
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn clear(&mut self) {
        self.latest.clear();
        self.price = None;
    }
}

#[derive(Debug, Clone)]
pub struct Security {
    pub symbol: Symbol,
    pub resolution: Resolution,
    pub cache: SecurityCache,
}

impl Security {
    pub fn new(symbol: Symbol, resolution: Resolution) -> Self {
        Security {
            symbol,
            resolution,
            cache: SecurityCache::default(),
        }
    }

    pub fn price(&self) -> Option<f64> {
        self.cache.price()
    }
}

/// Securities by symbol, plus the ordered subscription list that feeds them.
#[derive(Debug, Clone, Default)]
pub struct SecurityManager {
    securities: BTreeMap<Symbol, Security>,
    subscriptions: Vec<Subscription>,
}

impl SecurityManager {
    /// Register a subscription, creating the security on first use.
    /// Subscribing the same symbol and type twice is a no-op.
    pub fn subscribe(&mut self, subscription: Subscription) -> &Security {
        let duplicate = self.subscriptions.iter().any(|s| {
            s.symbol == subscription.symbol && s.data_type == subscription.data_type
        });
        if !duplicate {
            self.subscriptions.push(subscription.clone());
        }
        self.securities
            .entry(subscription.symbol.clone())
            .or_insert_with(|| Security::new(subscription.symbol, subscription.resolution))
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Security> {
        self.securities.get(symbol)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.securities.contains_key(symbol)
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn len(&self) -> usize {
        self.securities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }

    /// Route a delivered point into the caches. Data keyed by a derived symbol
    /// is also visible from its underlying security.
    pub fn update(&mut self, data: &BaseData) {
        let symbol = data.symbol();
        if let Some(security) = self.securities.get_mut(symbol) {
            security.cache.store(data);
        }
        if let Some(underlying) = symbol.underlying() {
            if let Some(security) = self.securities.get_mut(underlying) {
                security.cache.store(data);
            }
        }
    }

    /// Latest known price per symbol.
    pub fn price_map(&self) -> HashMap<Symbol, f64> {
        self.securities
            .values()
            .filter_map(|s| s.price().map(|p| (s.symbol.clone(), p)))
            .collect()
    }
}

use std::collections::HashMap;

use crate::core::graph::OperandId;
use crate::error::{ConfigErrorCode, Error, Result};

/// Maps each lowered operand to the backend node producing it.
///
/// An operand is bound exactly once, so every consumer of a fan-out operand
/// observes the same node no matter which converter runs first.
#[derive(Debug, Clone)]
pub struct OperandNodeCache<N> {
    nodes: HashMap<OperandId, N>,
}

impl<N> Default for OperandNodeCache<N> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }
}

impl<N> OperandNodeCache<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, operand: OperandId, node: N) -> Result<()> {
        if self.nodes.contains_key(&operand) {
            return Err(
                Error::config(ConfigErrorCode::OperandAlreadyLowered, None::<String>).at_operand(operand),
            );
        }
        self.nodes.insert(operand, node);
        Ok(())
    }

    pub fn get(&self, operand: OperandId) -> Result<&N> {
        self.nodes.get(&operand).ok_or_else(|| {
            Error::config(ConfigErrorCode::OperandNotLowered, None::<String>).at_operand(operand)
        })
    }

    pub fn contains(&self, operand: OperandId) -> bool {
        self.nodes.contains_key(&operand)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_each_operand_once() {
        let mut cache = OperandNodeCache::new();
        cache.insert(OperandId(3), "node-a").unwrap();
        let err = cache.insert(OperandId(3), "node-b").expect_err("rebinding %3");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::OperandAlreadyLowered));
        assert_eq!(cache.get(OperandId(3)).unwrap(), &"node-a");
    }

    #[test]
    fn missing_operand_is_not_lowered() {
        let cache = OperandNodeCache::<u32>::new();
        let err = cache.get(OperandId(0)).expect_err("nothing bound");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::OperandNotLowered));
    }
}

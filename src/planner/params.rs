//! Stack parameters: desired values, live values and the difference between them.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::remote::StackTransport;

/// Parameter values keyed by parameter name.
pub type ParameterMap = BTreeMap<String, String>;

/// Desired parameters whose value differs from what the stack currently uses.
///
/// A desired key absent from the live stack counts as changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParameterDelta {
    changed: ParameterMap,
}

impl ParameterDelta {
    /// Computes the delta between desired and live values.
    #[must_use]
    pub fn compute(desired: &ParameterMap, live: &ParameterMap) -> Self {
        let changed = desired
            .iter()
            .filter(|(key, value)| live.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { changed }
    }

    /// Returns true if no parameter changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Returns the number of changed parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changed.len()
    }

    /// Returns the new value of a changed parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.changed.get(key).map(String::as_str)
    }

    /// Iterates over changed parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.changed.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Source of the parameter values currently applied to a stack.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterSource: Send + Sync {
    /// Returns the live parameters, or `None` if the stack does not exist.
    async fn live_parameters(&self) -> Result<Option<ParameterMap>>;
}

/// Reads live parameters of one stack through a transport.
pub struct LiveStackParameters<'a> {
    transport: &'a dyn StackTransport,
    stack_name: &'a str,
}

impl<'a> LiveStackParameters<'a> {
    /// Creates a source for the named stack.
    #[must_use]
    pub const fn new(transport: &'a dyn StackTransport, stack_name: &'a str) -> Self {
        Self {
            transport,
            stack_name,
        }
    }
}

#[async_trait]
impl ParameterSource for LiveStackParameters<'_> {
    async fn live_parameters(&self) -> Result<Option<ParameterMap>> {
        Ok(self
            .transport
            .describe_stack(self.stack_name)
            .await?
            .map(|stack| stack.parameters))
    }
}

//! Mapping of logical resource identifiers to live physical handles.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error};

use crate::error::{ResolveError, Result};
use crate::remote::StackTransport;

/// Resolves logical identifiers against the live resources of a stack.
pub struct ResourceResolver<'a> {
    transport: &'a dyn StackTransport,
}

impl<'a> ResourceResolver<'a> {
    /// Creates a resolver over a transport.
    #[must_use]
    pub const fn new(transport: &'a dyn StackTransport) -> Self {
        Self { transport }
    }

    /// Returns the physical handle of every requested logical identifier.
    ///
    /// Pages are fetched until every identifier is found or the listing is
    /// exhausted. Resources without a physical handle count as missing.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ResourceCountMismatch`] naming the identifiers
    /// that could not be resolved, or the error of a failed listing call.
    pub async fn resolve(
        &self,
        stack_name: &str,
        logical_ids: &[String],
    ) -> Result<BTreeMap<String, String>> {
        let wanted: BTreeSet<&str> = logical_ids.iter().map(String::as_str).collect();
        let mut resolved = BTreeMap::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0_usize;

        loop {
            let page = self
                .transport
                .list_stack_resources(stack_name, next_token.take())
                .await?;
            pages += 1;

            for resource in page.resources {
                if !wanted.contains(resource.logical_id.as_str()) {
                    continue;
                }
                if let Some(physical_id) = resource.physical_id {
                    resolved.insert(resource.logical_id, physical_id);
                }
            }

            if resolved.len() == wanted.len() {
                break;
            }
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(
            "Resolved {}/{} resources of {stack_name} in {pages} page(s)",
            resolved.len(),
            wanted.len()
        );

        if resolved.len() != wanted.len() {
            let missing: Vec<String> = wanted
                .iter()
                .filter(|id| !resolved.contains_key(**id))
                .map(|id| (*id).to_string())
                .collect();
            error!("Unresolved resources on {stack_name}: {}", missing.join(", "));
            return Err(ResolveError::ResourceCountMismatch {
                stack: stack_name.to_string(),
                expected: wanted.len(),
                resolved: resolved.len(),
                missing,
            }
            .into());
        }

        Ok(resolved)
    }
}

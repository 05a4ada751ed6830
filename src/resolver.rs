//! The resolution algorithm.
//!
//! Resolving a key walks these steps, all against one
//! [`ResolutionContext`] per top-level call:
//!
//! 1. Push the key; a key already in flight is a circular dependency.
//! 2. Select a binding: candidates are grouped by qualifier rank and
//!    priority, conditions are evaluated group by group, and the first group
//!    with a passing candidate must contain exactly one.
//! 3. Push the binding's own key when it differs from the requested one.
//! 4. Return a cached instance when the binding's store holds one.
//! 5. Resolve declared dependencies, then let the scope manager construct:
//!    provider, lifecycle pipeline, optional interception proxy.
//! 6. Cast to the requested type when the binding was reached through an
//!    exposure.

use std::time::Instant;

use tracing::{debug, trace};

use crate::binding::registry::{Candidate, FALLBACK_RANK};
use crate::binding::{Binding, ConditionContext};
use crate::context::resolver_context::ResolvedDependencies;
use crate::context::{ContextInner, ResolverContext};
use crate::error::{ContainerError, ContainerResult};
use crate::instance::Instance;
use crate::internal::ResolutionContext;
use crate::key::ComponentKey;
use crate::store::Constructed;

pub(crate) struct ComponentResolver<'c> {
    context: &'c ContextInner,
}

impl<'c> ComponentResolver<'c> {
    pub(crate) fn new(context: &'c ContextInner) -> Self {
        Self { context }
    }

    /// Resolves `key`; with `optional`, a missing binding for `key` is `None`.
    pub(crate) fn resolve(
        &self,
        key: &ComponentKey,
        rc: &ResolutionContext<'_>,
        optional: bool,
    ) -> ContainerResult<Option<Instance>> {
        let observers = &self.context.observers;
        let started = Instant::now();
        observers.resolving(key);

        match self.resolve_required(key, rc) {
            Ok((instance, constructed)) => {
                observers.resolved(key, started.elapsed(), constructed);
                Ok(Some(instance))
            }
            Err(err) if optional && err.is_missing(key) => {
                trace!(key = %key, "optional component absent");
                Ok(None)
            }
            Err(err) => {
                observers.failed(key, &err);
                Err(err)
            }
        }
    }

    fn resolve_required(
        &self,
        key: &ComponentKey,
        rc: &ResolutionContext<'_>,
    ) -> ContainerResult<(Instance, bool)> {
        if self.context.is_closed() {
            return Err(ContainerError::Closed { key: key.clone() });
        }

        let _in_flight = rc.enter(key)?;
        let candidate = self.select(key, rc)?;
        let binding = &candidate.binding;

        // The same binding must not be re-entered through another key.
        let _binding_in_flight = if binding.key != *key {
            Some(rc.enter(&binding.key)?)
        } else {
            None
        };

        self.context.registry.mark_resolved(key);
        self.context.registry.mark_resolved(&binding.key);

        let (instance, constructed) = self.obtain(binding, rc)?;
        let instance = match &candidate.cast {
            Some(cast) => cast(&instance).ok_or_else(|| ContainerError::TypeMismatch {
                key: key.clone(),
                expected: key.type_name(),
            })?,
            None => instance,
        };
        Ok((instance, constructed))
    }

    /// Picks the binding for `key`.
    fn select(&self, key: &ComponentKey, rc: &ResolutionContext<'_>) -> ContainerResult<Candidate> {
        let mut candidates = self.context.registry.candidates(key);
        if candidates.is_empty() {
            return Err(ContainerError::ComponentResolution {
                key: key.clone(),
                reason: "no binding registered".into(),
                trace: rc.trace(),
            });
        }

        // A qualified request never falls back onto the default binding that
        // is currently being built; a delegate must be bound separately.
        if key.qualifier().is_some() {
            candidates.retain(|c| !(c.rank == FALLBACK_RANK && rc.is_in_flight(&c.binding.key)));
            if candidates.is_empty() {
                return Err(ContainerError::ComponentResolution {
                    key: key.clone(),
                    reason: "only the in-flight default binding matches".into(),
                    trace: rc.trace(),
                });
            }
        }

        let conditions = ConditionContext {
            key,
            properties: &self.context.properties,
            registry: &self.context.registry,
        };

        let mut rejected = 0usize;
        let mut start = 0;
        while start < candidates.len() {
            let head = &candidates[start];
            let end = candidates[start..]
                .iter()
                .position(|c| c.rank != head.rank || c.binding.priority != head.binding.priority)
                .map_or(candidates.len(), |offset| start + offset);

            let eligible: Vec<&Candidate> = candidates[start..end]
                .iter()
                .filter(|c| {
                    let met = c.binding.conditions_met(&conditions);
                    if !met {
                        debug!(key = %key, binding = %c.binding, "conditions not met, trying next candidate");
                        rejected += 1;
                    }
                    met
                })
                .collect();

            match eligible.as_slice() {
                [] => start = end,
                [winner] => {
                    trace!(key = %key, binding = %winner.binding, "binding selected");
                    return Ok((*winner).clone());
                }
                tied => {
                    return Err(ContainerError::AmbiguousBinding {
                        key: key.clone(),
                        candidates: tied.iter().map(|c| c.binding.to_string()).collect(),
                        trace: rc.trace(),
                    });
                }
            }
        }

        Err(ContainerError::ComponentResolution {
            key: key.clone(),
            reason: format!("conditions not met for {} candidate(s)", rejected),
            trace: rc.trace(),
        })
    }

    /// Returns the cached instance or constructs a new one.
    fn obtain(&self, binding: &Binding, rc: &ResolutionContext<'_>) -> ContainerResult<(Instance, bool)> {
        let scopes = &self.context.scopes;
        if let Some(instance) = scopes.cached(binding, rc)? {
            trace!(key = %binding.key, scope = %binding.scope, "cache hit");
            return Ok((instance, false));
        }

        // Declared dependencies resolve before the construction claim, so
        // declared cycles fail before anything blocks.
        let dependencies = self.resolve_dependencies(binding, rc)?;
        scopes.obtain(binding, rc, || self.construct(binding, rc, &dependencies))
    }

    fn resolve_dependencies(
        &self,
        binding: &Binding,
        rc: &ResolutionContext<'_>,
    ) -> ContainerResult<ResolvedDependencies> {
        let mut resolved = ResolvedDependencies::default();
        for dependency in &binding.dependencies {
            let instance = self.resolve(&dependency.key, rc, dependency.optional)?;
            resolved.push(dependency.key.clone(), instance);
        }
        Ok(resolved)
    }

    fn construct(
        &self,
        binding: &Binding,
        rc: &ResolutionContext<'_>,
        dependencies: &ResolvedDependencies,
    ) -> ContainerResult<Constructed> {
        let resolver = ResolverContext::new(self.context, rc, dependencies, &binding.key);
        let fail = |err| ContainerError::construction(&binding.key, rc.trace(), err);

        let raw = (binding.provider)(&resolver).map_err(fail)?;
        let target = self.context.lifecycle.process(binding, raw, &resolver).map_err(fail)?;
        let instance = match &binding.interception {
            Some(wrap) => wrap(&target, &self.context.proxies)?,
            None => target.clone(),
        };

        debug!(key = %binding.key, scope = %binding.scope, "component constructed");
        Ok(Constructed { instance, target })
    }

    /// Resolves one binding directly, bypassing selection.
    pub(crate) fn resolve_binding(
        &self,
        binding: &Binding,
        rc: &ResolutionContext<'_>,
    ) -> ContainerResult<(Instance, bool)> {
        if self.context.is_closed() {
            return Err(ContainerError::Closed {
                key: binding.key.clone(),
            });
        }
        let _in_flight = rc.enter(&binding.key)?;
        self.context.registry.mark_resolved(&binding.key);
        self.obtain(binding, rc)
    }
}

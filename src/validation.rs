//! Static checks over the registered bindings.
//!
//! [`ApplicationContext::validate`](crate::ApplicationContext::validate)
//! inspects declared dependencies without constructing anything, so
//! configuration errors surface at startup instead of on the first `get`.
//! Conditions are not evaluated; a binding whose conditions may disable it is
//! still treated as a candidate.
//!
//! | Check | Reported as |
//! |-------|-------------|
//! | Required dependency with no binding at all | [`ValidationIssue::MissingDependency`] |
//! | Declared dependencies forming a cycle | [`ValidationIssue::CircularDependency`] |
//! | Singleton depending on a named-scope binding | [`ValidationIssue::CaptiveDependency`] |
//! | Several unconditional bindings tied for one key | [`ValidationIssue::AmbiguousDefault`] |
//!
//! # Examples
//!
//! ```
//! use ferrous_context::{ApplicationContext, ValidationIssue};
//!
//! struct Session;
//! struct Cache;
//!
//! let ctx = ApplicationContext::new();
//! ctx.bind::<Session>().in_scope("request").to(|_| Ok(Session)).unwrap();
//! ctx.bind::<Cache>().depends_on::<Session>().to(|_| Ok(Cache)).unwrap();
//!
//! let report = ctx.validate();
//! assert!(!report.is_valid());
//! assert!(matches!(report.issues()[0], ValidationIssue::CaptiveDependency { .. }));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::binding::registry::Candidate;
use crate::binding::{Binding, BindingId, BindingRegistry};
use crate::internal::{Map, Set};
use crate::key::ComponentKey;
use crate::scope::Scope;

/// A configuration problem found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("{binding} requires {dependency}, which has no binding")]
    MissingDependency {
        binding: ComponentKey,
        dependency: ComponentKey,
    },

    #[error("declared dependency cycle: {}", join(.cycle))]
    CircularDependency { cycle: Vec<ComponentKey> },

    #[error("singleton {singleton} depends on {dependency}, bound in scope '{scope}'")]
    CaptiveDependency {
        singleton: ComponentKey,
        dependency: ComponentKey,
        scope: Arc<str>,
    },

    #[error("{key} has {} unconditional bindings with equal rank and priority: {}", .candidates.len(), .candidates.join(", "))]
    AmbiguousDefault { key: ComponentKey, candidates: Vec<String> },
}

fn join(keys: &[ComponentKey]) -> String {
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
}

/// Outcome of a validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
    bindings: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Number of bindings inspected.
    pub fn bindings_checked(&self) -> usize {
        self.bindings
    }

    /// `Ok` when no issue was found, otherwise the report itself.
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return write!(f, "{} bindings, no issues", self.bindings);
        }
        write!(f, "{} issue(s) in {} bindings", self.issues.len(), self.bindings)?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Runs every check against `registry`.
pub fn validate(registry: &BindingRegistry) -> ValidationReport {
    let bindings = registry.bindings();
    let mut issues = Vec::new();

    // Edges go to the leading candidate group, as selection would.
    let mut edges: Map<BindingId, Vec<Arc<Binding>>> = Map::default();
    for binding in &bindings {
        let targets = edges.entry(binding.id).or_default();
        for dependency in &binding.dependencies {
            let candidates = registry.candidates(&dependency.key);
            let group = leading_group(&candidates);
            if group.is_empty() {
                if !dependency.optional {
                    issues.push(ValidationIssue::MissingDependency {
                        binding: binding.key.clone(),
                        dependency: dependency.key.clone(),
                    });
                }
                continue;
            }
            for candidate in group {
                if binding.scope == Scope::Singleton {
                    if let Scope::Named(scope) = &candidate.binding.scope {
                        issues.push(ValidationIssue::CaptiveDependency {
                            singleton: binding.key.clone(),
                            dependency: dependency.key.clone(),
                            scope: scope.clone(),
                        });
                    }
                }
                targets.push(candidate.binding.clone());
            }
        }
    }

    let mut walk = CycleWalk {
        edges: &edges,
        done: Set::default(),
        path: Vec::new(),
        cycles: Vec::new(),
    };
    for binding in &bindings {
        walk.visit(binding);
    }
    issues.extend(
        walk.cycles
            .into_iter()
            .map(|cycle| ValidationIssue::CircularDependency { cycle }),
    );

    let mut seen: Set<ComponentKey> = Set::default();
    for binding in &bindings {
        for key in std::iter::once(&binding.key).chain(binding.exposed_as()) {
            if !seen.insert(key.clone()) {
                continue;
            }
            let candidates = registry.candidates(key);
            let group = leading_group(&candidates);
            if group.len() > 1 && group.iter().all(|c| c.binding.conditions.is_empty()) {
                issues.push(ValidationIssue::AmbiguousDefault {
                    key: key.clone(),
                    candidates: group.iter().map(|c| c.binding.to_string()).collect(),
                });
            }
        }
    }

    tracing::debug!(bindings = bindings.len(), issues = issues.len(), "validation finished");
    ValidationReport {
        issues,
        bindings: bindings.len(),
    }
}

fn leading_group(candidates: &[Candidate]) -> &[Candidate] {
    match candidates.first() {
        Some(head) => {
            let end = candidates
                .iter()
                .position(|c| c.rank != head.rank || c.binding.priority != head.binding.priority)
                .unwrap_or(candidates.len());
            &candidates[..end]
        }
        None => &[],
    }
}

struct CycleWalk<'a> {
    edges: &'a Map<BindingId, Vec<Arc<Binding>>>,
    done: Set<BindingId>,
    path: Vec<Arc<Binding>>,
    cycles: Vec<Vec<ComponentKey>>,
}

impl CycleWalk<'_> {
    fn visit(&mut self, binding: &Arc<Binding>) {
        if self.done.contains(&binding.id) {
            return;
        }
        if let Some(start) = self.path.iter().position(|b| b.id == binding.id) {
            let mut cycle: Vec<ComponentKey> = self.path[start..].iter().map(|b| b.key.clone()).collect();
            cycle.push(binding.key.clone());
            self.cycles.push(cycle);
            return;
        }

        self.path.push(binding.clone());
        let edges = self.edges;
        if let Some(targets) = edges.get(&binding.id) {
            for target in targets {
                self.visit(target);
            }
        }
        self.path.pop();
        self.done.insert(binding.id);
    }
}

//! OAuth scope evaluation.
//!
//! Provides [`ScopeRequirement`] for the "any one of these minimal
//! combinations" rule enforced at the protected endpoint, the free functions
//! [`validate_scopes`] and [`has_sufficient_scope`], and [`ScopePolicy`] for
//! per-capability checks inside the protected handler.

use std::collections::{BTreeSet, HashMap};

use super::error::OAuthError;
use super::token::AuthInfo;

/// Acceptable scope combinations for an operation.
///
/// Access is granted when the token holds *every* scope of *at least one*
/// combination (OR of ANDs). Different MCP capabilities need different
/// minimal grants, so a token holding any one of them is let through.
///
/// # Example
///
/// ```rust
/// use mcp_resource_gate::oauth::ScopeRequirement;
///
/// let requirement = ScopeRequirement::new()
///     .or(["entries:read"])
///     .or(["tags:read", "tags:write"]);
///
/// assert_eq!(requirement.describe(), "entries:read, tags:read tags:write");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeRequirement {
    // Scopes keep their declared order so challenges can echo them verbatim.
    combinations: Vec<Vec<String>>,
}

impl ScopeRequirement {
    /// Create a requirement with no combinations. It grants nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A requirement satisfied by any token, whatever its scopes.
    pub fn unrestricted() -> Self {
        Self {
            combinations: vec![Vec::new()],
        }
    }

    /// Build a requirement from a list of combinations.
    pub fn any_of<I, C, S>(combinations: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        combinations
            .into_iter()
            .fold(Self::new(), |requirement, combo| requirement.or(combo))
    }

    /// A requirement where each of the given scopes alone suffices.
    pub fn any_single(scopes: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        scopes
            .into_iter()
            .fold(Self::new(), |requirement, scope| {
                requirement.or([scope.as_ref().to_string()])
            })
    }

    /// Add an alternative combination.
    ///
    /// Combinations and the scopes within them keep their insertion order.
    /// A repeated scope keeps its first position; a combination holding the
    /// same scopes as an earlier one is ignored.
    pub fn or(mut self, combination: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut scopes: Vec<String> = Vec::new();
        for scope in combination.into_iter().map(Into::into) {
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }

        let as_set: BTreeSet<&String> = scopes.iter().collect();
        let duplicate = self
            .combinations
            .iter()
            .any(|existing| existing.iter().collect::<BTreeSet<_>>() == as_set);
        if !duplicate {
            self.combinations.push(scopes);
        }
        self
    }

    /// The accepted combinations, in declaration order.
    pub fn combinations(&self) -> &[Vec<String>] {
        &self.combinations
    }

    /// Returns true if no combination is configured.
    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    /// Check a set of granted scopes against this requirement.
    pub fn is_satisfied_by(&self, granted: &BTreeSet<String>) -> bool {
        self.combinations
            .iter()
            .any(|combination| combination.iter().all(|scope| granted.contains(scope)))
    }

    /// Human-readable list of the combinations: scopes space-joined,
    /// combinations comma-joined.
    pub fn describe(&self) -> String {
        self.combinations
            .iter()
            .map(|combination| combination.join(" "))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Returns true iff every scope in `required` was granted.
pub fn validate_scopes(auth: &AuthInfo, required: &[impl AsRef<str>]) -> bool {
    required.iter().all(|scope| auth.has_scope(scope.as_ref()))
}

/// Returns true iff at least one combination in `requirement` was granted in full.
pub fn has_sufficient_scope(auth: &AuthInfo, requirement: &ScopeRequirement) -> bool {
    requirement.is_satisfied_by(auth.scopes())
}

/// Policy mapping MCP capabilities to the scopes they need.
///
/// Used inside the protected handler to decide which tools, resources and
/// prompts a caller may use. Capabilities without an entry need no scope.
///
/// # Example
///
/// ```rust
/// use mcp_resource_gate::oauth::ScopePolicy;
///
/// let policy = ScopePolicy::new()
///     .tool_scope("create_entry", "entries:write")
///     .tool_scope("create_tag", "tags:write")
///     .resource_scope("epicme://entries/{id}", "entries:read")
///     .prompt_scope("suggest_tags", "tags:read");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScopePolicy {
    tool_scopes: HashMap<String, Vec<String>>,
    resource_scopes: HashMap<String, Vec<String>>,
    prompt_scopes: HashMap<String, Vec<String>>,
}

impl ScopePolicy {
    /// Create an empty policy (no scopes required for anything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a scope for a tool. Repeated calls accumulate (AND).
    pub fn tool_scope(mut self, tool_name: impl Into<String>, scope: impl Into<String>) -> Self {
        push_scope(&mut self.tool_scopes, tool_name.into(), scope.into());
        self
    }

    /// Require a scope for a resource URI or URI template.
    pub fn resource_scope(mut self, uri: impl Into<String>, scope: impl Into<String>) -> Self {
        push_scope(&mut self.resource_scopes, uri.into(), scope.into());
        self
    }

    /// Require a scope for a prompt.
    pub fn prompt_scope(mut self, prompt_name: impl Into<String>, scope: impl Into<String>) -> Self {
        push_scope(&mut self.prompt_scopes, prompt_name.into(), scope.into());
        self
    }

    pub fn permits_tool(&self, tool_name: &str, auth: &AuthInfo) -> bool {
        permits(&self.tool_scopes, tool_name, auth)
    }

    pub fn permits_resource(&self, uri: &str, auth: &AuthInfo) -> bool {
        permits(&self.resource_scopes, uri, auth)
    }

    pub fn permits_prompt(&self, prompt_name: &str, auth: &AuthInfo) -> bool {
        permits(&self.prompt_scopes, prompt_name, auth)
    }

    /// Like [`permits_tool`](Self::permits_tool), returning the error a
    /// handler can turn into a 403.
    pub fn check_tool(&self, tool_name: &str, auth: &AuthInfo) -> Result<(), OAuthError> {
        check(&self.tool_scopes, tool_name, auth)
    }

    pub fn check_resource(&self, uri: &str, auth: &AuthInfo) -> Result<(), OAuthError> {
        check(&self.resource_scopes, uri, auth)
    }

    pub fn check_prompt(&self, prompt_name: &str, auth: &AuthInfo) -> Result<(), OAuthError> {
        check(&self.prompt_scopes, prompt_name, auth)
    }
}

fn push_scope(map: &mut HashMap<String, Vec<String>>, key: String, scope: String) {
    let entry = map.entry(key).or_default();
    if !entry.contains(&scope) {
        entry.push(scope);
    }
}

fn permits(map: &HashMap<String, Vec<String>>, key: &str, auth: &AuthInfo) -> bool {
    map.get(key)
        .is_none_or(|required| validate_scopes(auth, required.as_slice()))
}

fn check(map: &HashMap<String, Vec<String>>, key: &str, auth: &AuthInfo) -> Result<(), OAuthError> {
    match map.get(key) {
        Some(required) if !validate_scopes(auth, required.as_slice()) => {
            Err(OAuthError::InsufficientScope {
                requirement: ScopeRequirement::new().or(required.iter().cloned()),
            })
        }
        _ => Ok(()),
    }
}

//! Action resolution - maps raw, possibly malformed action identifiers to canonical capabilities
//!
//! Lookup order: exact -> alias -> fuzzy -> composite pattern (context only).

use super::alias;
use super::dynamic::{self, DynamicResolution};
use super::fuzzy;
use crate::actions::{Capability, CapabilityCategory};
use crate::core::config::ResolverConfig;
use crate::core::types::Params;
use crate::plan::Plan;
use serde::{Deserialize, Serialize};

/// How a raw identifier was turned into an executable action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Exact,
    Alias,
    Fuzzy,
    Dynamic,
    None,
}

/// Result of resolving a single identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAction {
    /// Canonical identifier, `dynamic:<pattern>` for composite patterns, empty when unresolved
    pub canonical: String,
    pub capability: Option<Capability>,
    pub source: ResolutionSource,
    /// 0.0 - 1.0
    pub confidence: f32,
}

impl ResolvedAction {
    fn found(capability: Capability, source: ResolutionSource, confidence: f32) -> Self {
        Self {
            canonical: capability.as_str().to_string(),
            capability: Some(capability),
            source,
            confidence,
        }
    }

    pub fn none() -> Self {
        Self {
            canonical: String::new(),
            capability: None,
            source: ResolutionSource::None,
            confidence: 0.0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.source != ResolutionSource::None
    }
}

/// Resolution that may carry composite-pattern operations
#[derive(Debug, Clone, PartialEq)]
pub struct ContextualResolution {
    pub action: ResolvedAction,
    pub dynamic: Option<DynamicResolution>,
}

const ALIAS_CONFIDENCE: f32 = 0.95;
const DYNAMIC_CONFIDENCE: f32 = 0.7;

/// Resolves raw action identifiers against the canonical catalog
#[derive(Debug, Clone)]
pub struct ActionResolver {
    fuzzy_threshold: f32,
    max_repeat: u32,
}

impl Default for ActionResolver {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

impl ActionResolver {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            fuzzy_threshold: config.fuzzy_threshold,
            max_repeat: config.max_repeat,
        }
    }

    /// Resolve an identifier on its own (no composite patterns)
    pub fn resolve(&self, raw: &str) -> ResolvedAction {
        let raw = raw.trim();
        if !is_valid_shape(raw) {
            tracing::debug!(raw, "action identifier has invalid shape");
            return ResolvedAction::none();
        }

        if let Some(cap) = Capability::from_canonical(raw) {
            return ResolvedAction::found(cap, ResolutionSource::Exact, 1.0);
        }

        if let Some(cap) = alias::lookup(raw) {
            tracing::debug!(raw, canonical = cap.as_str(), "alias match");
            return ResolvedAction::found(cap, ResolutionSource::Alias, ALIAS_CONFIDENCE);
        }

        self.resolve_fuzzy(raw)
    }

    /// Resolve an identifier, falling back to composite patterns over the request text
    pub fn resolve_with_context(
        &self,
        raw: &str,
        request_text: &str,
        params: &Params,
    ) -> ContextualResolution {
        let action = self.resolve(raw);
        // A category default is a guess; a composite pattern over the request wins over it
        if action.is_resolved() && !self.is_category_default(&action) {
            return ContextualResolution {
                action,
                dynamic: None,
            };
        }

        match dynamic::match_composite(request_text, params, self.max_repeat) {
            Some(resolution) => ContextualResolution {
                action: ResolvedAction {
                    canonical: format!("dynamic:{}", resolution.pattern),
                    capability: None,
                    source: ResolutionSource::Dynamic,
                    confidence: DYNAMIC_CONFIDENCE,
                },
                dynamic: Some(resolution),
            },
            None => ContextualResolution {
                action,
                dynamic: None,
            },
        }
    }

    /// Rewrite each step's action to the identifier that will actually run
    ///
    /// Unresolvable steps keep their raw identifier. Returns the number of
    /// corrected steps.
    pub fn canonicalize(&self, plan: &mut Plan, request_text: &str) -> usize {
        let mut corrected = 0;
        for step in &mut plan.steps {
            let resolution = self.resolve_with_context(&step.action, request_text, &step.parameters);
            if resolution.action.is_resolved() && resolution.action.canonical != step.action {
                tracing::debug!(
                    step = %step.id,
                    from = %step.action,
                    to = %resolution.action.canonical,
                    "action corrected"
                );
                step.action = resolution.action.canonical;
                corrected += 1;
            }
        }
        corrected
    }

    fn resolve_fuzzy(&self, raw: &str) -> ResolvedAction {
        let category = raw.split('.').next().and_then(CapabilityCategory::from_prefix);

        let admissible = |cap: &Capability| self.admissible(raw, *cap);
        let best = match category {
            Some(cat) => fuzzy::best_match(raw, cat.members().filter(admissible)),
            None => fuzzy::best_match(raw, Capability::ALL.into_iter().filter(admissible)),
        };

        if let Some((cap, score)) = best {
            if score >= self.fuzzy_threshold {
                tracing::debug!(raw, canonical = cap.as_str(), score, "fuzzy match");
                return ResolvedAction::found(cap, ResolutionSource::Fuzzy, score);
            }
        }

        // Recognized category but no close verb: take the category's default capability
        if let Some(fallback) = category.map(|cat| cat.default_capability()) {
            if !fallback.is_destructive() {
                let score = fuzzy::similarity(raw, fallback.as_str());
                tracing::debug!(raw, canonical = fallback.as_str(), "category default");
                return ResolvedAction::found(fallback, ResolutionSource::Fuzzy, score);
            }
        }

        tracing::debug!(raw, "no canonical action found");
        ResolvedAction::none()
    }

    /// Destructive capabilities also need a close verb; a shared category prefix is not enough
    fn admissible(&self, raw: &str, cap: Capability) -> bool {
        if !cap.is_destructive() {
            return true;
        }
        let verb = raw.rsplit('.').next().unwrap_or(raw);
        let target = cap.as_str().rsplit('.').next().unwrap_or_default();
        fuzzy::similarity(verb, target) >= self.fuzzy_threshold
    }

    /// Fuzzy results below the threshold only come from the category default
    fn is_category_default(&self, action: &ResolvedAction) -> bool {
        action.source == ResolutionSource::Fuzzy && action.confidence < self.fuzzy_threshold
    }
}

/// Lowercase segments of `[a-z][a-z_]*` joined by single dots, at least two segments
pub fn is_valid_shape(raw: &str) -> bool {
    let mut segments = 0;
    for segment in raw.split('.') {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return false,
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c == '_') {
            return false;
        }
        segments += 1;
    }
    segments >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_validation() {
        assert!(is_valid_shape("member.ban"));
        assert!(is_valid_shape("message.bulk_delete"));
        assert!(is_valid_shape("member.roles.remove"));
        assert!(!is_valid_shape("ban"));
        assert!(!is_valid_shape("Member.Ban"));
        assert!(!is_valid_shape("member..ban"));
        assert!(!is_valid_shape("member.ban."));
        assert!(!is_valid_shape("member-ban"));
        assert!(!is_valid_shape(""));
    }

    #[test]
    fn test_exact_match() {
        let resolved = ActionResolver::default().resolve("member.ban");
        assert_eq!(resolved.canonical, "member.ban");
        assert_eq!(resolved.source, ResolutionSource::Exact);
        assert_eq!(resolved.confidence, 1.0);
    }

    #[test]
    fn test_alias_match() {
        let resolved = ActionResolver::default().resolve("member.roles.remove");
        assert_eq!(resolved.canonical, "role.remove");
        assert_eq!(resolved.source, ResolutionSource::Alias);
    }

    #[test]
    fn test_fuzzy_within_category() {
        let resolved = ActionResolver::default().resolve("member.timout");
        assert_eq!(resolved.canonical, "member.timeout");
        assert_eq!(resolved.source, ResolutionSource::Fuzzy);
        assert!(resolved.confidence >= 0.6);
    }

    #[test]
    fn test_unknown_category_compares_full_set() {
        let resolved = ActionResolver::default().resolve("memeber.timeot");
        assert_eq!(resolved.canonical, "member.timeout");
        assert_eq!(resolved.source, ResolutionSource::Fuzzy);
    }

    #[test]
    fn test_category_default_when_verb_unrecognizable() {
        let resolved = ActionResolver::default().resolve("role.zzzzzzzzzzzzzzzz");
        assert_eq!(resolved.canonical, "role.add");
        assert_eq!(resolved.source, ResolutionSource::Fuzzy);
        assert!(resolved.confidence < 0.6);
    }

    #[test]
    fn test_unknown_member_verb_never_bans() {
        let resolver = ActionResolver::default();

        let warn = resolver.resolve("member.warn");
        assert_ne!(warn.canonical, "member.ban");
        assert!(!warn.capability.unwrap().is_destructive());

        let hopeless = resolver.resolve("member.zzzzzzzzzz");
        assert_eq!(hopeless.canonical, "member.timeout");
        assert!(hopeless.confidence < 0.6);
    }

    #[test]
    fn test_destructive_typos_still_resolve() {
        let resolver = ActionResolver::default();
        assert_eq!(resolver.resolve("member.bann").canonical, "member.ban");
        assert_eq!(resolver.resolve("channel.delet").canonical, "channel.delete");
    }

    #[test]
    fn test_composite_pattern_beats_category_default() {
        let resolver = ActionResolver::default();
        let resolution =
            resolver.resolve_with_context("member.zzzzzzzzzz", "say \"gm\" 3 times", &Params::new());
        assert_eq!(resolution.action.source, ResolutionSource::Dynamic);
        assert!(resolution.dynamic.is_some());

        let no_pattern = resolver.resolve_with_context("member.zzzzzzzzzz", "hello", &Params::new());
        assert_eq!(no_pattern.action.canonical, "member.timeout");
        assert!(no_pattern.dynamic.is_none());
    }

    #[test]
    fn test_canonicalize_rewrites_plan() {
        use crate::plan::Step;

        let mut plan = Plan::sequential(vec![
            Step::new("1", "ban.member").with_param("user", "9"),
            Step::new("2", "message.create").with_param("content", "bye"),
            Step::new("3", "zzzz.qqqqqqqq"),
        ]);
        let corrected = ActionResolver::default().canonicalize(&mut plan, "ban 9");

        assert_eq!(corrected, 1);
        assert_eq!(plan.steps[0].action, "member.ban");
        assert_eq!(plan.steps[1].action, "message.create");
        assert_eq!(plan.steps[2].action, "zzzz.qqqqqqqq");
        assert!(plan.summary().contains("member.ban"));
    }

    #[test]
    fn test_nothing_close_is_none() {
        let resolved = ActionResolver::default().resolve("zzzz.qqqqqqqq");
        assert_eq!(resolved.source, ResolutionSource::None);
        assert!(!resolved.is_resolved());
    }

    #[test]
    fn test_invalid_shape_is_none_even_if_close() {
        let resolved = ActionResolver::default().resolve("Member.Ban");
        assert_eq!(resolved.source, ResolutionSource::None);
    }

    #[test]
    fn test_context_uses_composite_patterns_only_when_unresolved() {
        let resolver = ActionResolver::default();
        let params = json!({"user": "1", "username": "abc"}).as_object().cloned().unwrap();

        let direct = resolver.resolve_with_context(
            "member.timeout",
            "timeout him for as many minutes as his name is long",
            &params,
        );
        assert!(direct.dynamic.is_none());
        assert_eq!(direct.action.source, ResolutionSource::Exact);

        let composite = resolver.resolve_with_context(
            "custom_magic",
            "timeout him for as many minutes as his name is long",
            &params,
        );
        assert_eq!(composite.action.source, ResolutionSource::Dynamic);
        assert_eq!(composite.action.canonical, "dynamic:name_length_timeout");
        assert_eq!(composite.dynamic.unwrap().operations.len(), 1);
    }
}

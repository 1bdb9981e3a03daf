use std::sync::Arc;

use npcinv_types::{Color, RuleDescriptor};

use super::RuleError;
use crate::filter::{FilterCompiler, ItemPredicate, preprocess};

/// Text of one rule as handed over by a [`RuleSourceProvider`](super::RuleSourceProvider).
///
/// `text` is `None` for disabled rules, which are never read.
#[derive(Debug, Clone)]
pub struct RuleSource {
    pub descriptor: RuleDescriptor,
    pub text: Option<Result<String, String>>,
}

impl RuleSource {
    pub fn new(descriptor: RuleDescriptor, text: impl Into<String>) -> Self {
        Self {
            descriptor,
            text: Some(Ok(text.into())),
        }
    }

    pub fn disabled(descriptor: RuleDescriptor) -> Self {
        Self {
            descriptor,
            text: None,
        }
    }

    pub fn unreadable(descriptor: RuleDescriptor, message: impl Into<String>) -> Self {
        Self {
            descriptor,
            text: Some(Err(message.into())),
        }
    }
}

/// One compiled rule.
#[derive(Debug)]
pub struct RuleBinding {
    pub position: usize,
    pub name: String,
    pub enabled: bool,
    pub color: Color,
    /// `None` for disabled rules and rules that failed to compile
    pub predicate: Option<Box<dyn ItemPredicate>>,
    pub min_open_prefixes: Option<u32>,
    pub min_open_suffixes: Option<u32>,
    /// Why an enabled rule has no predicate
    pub error: Option<String>,
}

impl RuleBinding {
    pub fn has_thresholds(&self) -> bool {
        self.min_open_prefixes.is_some() || self.min_open_suffixes.is_some()
    }

    /// Whether this binding can ever match.
    pub fn is_active(&self) -> bool {
        self.enabled && self.predicate.is_some()
    }

    fn inert(position: usize, descriptor: &RuleDescriptor, error: Option<String>) -> Self {
        Self {
            position,
            name: descriptor.name.clone(),
            enabled: descriptor.enabled,
            color: descriptor.color,
            predicate: None,
            min_open_prefixes: None,
            min_open_suffixes: None,
            error,
        }
    }
}

/// Ordered, immutable rule bindings. Replaced wholesale on reload.
#[derive(Debug, Default)]
pub struct RuleSet {
    bindings: Vec<RuleBinding>,
}

impl RuleSet {
    pub fn new(bindings: Vec<RuleBinding>) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &[RuleBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.bindings.iter().filter(|b| b.is_active()).count()
    }
}

pub struct CompiledRules {
    pub set: Arc<RuleSet>,
    pub errors: Vec<RuleError>,
}

/// Preprocess and compile every source, keeping input order.
///
/// Failures never abort the batch: the failing rule keeps its slot as a
/// binding that never matches and a diagnostic is recorded.
pub fn compile_rules(sources: &[RuleSource], compiler: &dyn FilterCompiler) -> CompiledRules {
    let mut bindings = Vec::with_capacity(sources.len());
    let mut errors = Vec::new();

    for (position, source) in sources.iter().enumerate() {
        let descriptor = &source.descriptor;
        if !descriptor.enabled {
            bindings.push(RuleBinding::inert(position, descriptor, None));
            continue;
        }

        let text = match &source.text {
            Some(Ok(text)) => text,
            Some(Err(message)) => {
                errors.push(RuleError::Source {
                    rule: descriptor.name.clone(),
                    message: message.clone(),
                });
                bindings.push(RuleBinding::inert(position, descriptor, Some(message.clone())));
                continue;
            }
            None => {
                let message = "rule text was not loaded".to_string();
                errors.push(RuleError::Source {
                    rule: descriptor.name.clone(),
                    message: message.clone(),
                });
                bindings.push(RuleBinding::inert(position, descriptor, Some(message)));
                continue;
            }
        };

        let pre = preprocess(text);
        match compiler.compile(&pre.expression) {
            Ok(predicate) => bindings.push(RuleBinding {
                position,
                name: descriptor.name.clone(),
                enabled: true,
                color: descriptor.color,
                predicate: Some(predicate),
                min_open_prefixes: pre.min_open_prefixes,
                min_open_suffixes: pre.min_open_suffixes,
                error: None,
            }),
            Err(error) => {
                tracing::warn!(rule = %descriptor.name, %error, "Rule failed to compile");
                bindings.push(RuleBinding::inert(position, descriptor, Some(error.to_string())));
                errors.push(RuleError::Compile {
                    rule: descriptor.name.clone(),
                    error,
                });
            }
        }
    }

    CompiledRules {
        set: Arc::new(RuleSet::new(bindings)),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ExprCompiler, FilterError};

    fn descriptor(name: &str) -> RuleDescriptor {
        RuleDescriptor::new(name, format!("{name}.ifl"), true)
    }

    #[test]
    fn test_order_and_thresholds_are_kept() {
        let sources = vec![
            RuleSource::new(descriptor("a"), "Rarity == \"Rare\" && OpenPrefixCount() >= 2"),
            RuleSource::new(descriptor("b"), "true\nOpenSuffixCount() == 1"),
        ];

        let compiled = compile_rules(&sources, &ExprCompiler);
        assert!(compiled.errors.is_empty());

        let bindings = compiled.set.bindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].name, "a");
        assert_eq!(bindings[0].position, 0);
        assert_eq!(bindings[0].min_open_prefixes, Some(2));
        assert_eq!(bindings[0].min_open_suffixes, None);
        assert_eq!(bindings[1].min_open_suffixes, Some(1));
        assert_eq!(compiled.set.active_count(), 2);
    }

    #[test]
    fn test_disabled_rules_keep_their_slot() {
        let mut off = descriptor("off");
        off.enabled = false;
        let sources = vec![
            RuleSource::disabled(off),
            RuleSource::new(descriptor("on"), "true"),
        ];

        let compiled = compile_rules(&sources, &ExprCompiler);
        let bindings = compiled.set.bindings();
        assert!(!bindings[0].enabled);
        assert!(bindings[0].predicate.is_none());
        assert!(!bindings[0].has_thresholds());
        assert!(bindings[1].is_active());
        assert!(compiled.errors.is_empty());
    }

    #[test]
    fn test_compile_failure_does_not_abort_batch() {
        let sources = vec![
            RuleSource::new(descriptor("broken"), "Rarity == "),
            RuleSource::new(descriptor("empty"), "// only a comment"),
            RuleSource::unreadable(descriptor("gone"), "permission denied"),
            RuleSource::new(descriptor("fine"), "true"),
        ];

        let compiled = compile_rules(&sources, &ExprCompiler);
        let bindings = compiled.set.bindings();

        assert_eq!(bindings.len(), 4);
        assert!(bindings[0].enabled && bindings[0].predicate.is_none());
        assert!(bindings[0].error.is_some());
        assert!(bindings[2].error.as_deref() == Some("permission denied"));
        assert!(bindings[3].is_active());

        assert_eq!(compiled.errors.len(), 3);
        assert!(matches!(
            &compiled.errors[1],
            RuleError::Compile { rule, error: FilterError::Empty } if rule == "empty"
        ));
        assert!(matches!(&compiled.errors[2], RuleError::Source { rule, .. } if rule == "gone"));
    }
}

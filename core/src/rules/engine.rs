//! First-match-wins evaluation of a [`RuleSet`].

use npcinv_types::Color;

use super::{RuleBinding, RuleSet};
use crate::filter::EvalContext;
use crate::item::ItemRecord;

/// Open-affix gate for a binding with thresholds.
///
/// Only items laid out on a real tab are eligible; mods are not read for
/// anything else.
fn passes_gate(binding: &RuleBinding, item: &ItemRecord, ctx: &EvalContext<'_>) -> bool {
    if !binding.has_thresholds() {
        return true;
    }
    if item.tab_index() < 0 || !item.is_displayed() {
        return false;
    }
    if let Some(min) = binding.min_open_prefixes {
        if ctx.affixes.open_prefixes(item) < min {
            return false;
        }
    }
    if let Some(min) = binding.min_open_suffixes {
        if ctx.affixes.open_suffixes(item) < min {
            return false;
        }
    }
    true
}

fn binding_matches(binding: &RuleBinding, item: &ItemRecord, ctx: &EvalContext<'_>) -> bool {
    if !binding.enabled {
        return false;
    }
    let Some(predicate) = &binding.predicate else {
        return false;
    };
    if !passes_gate(binding, item, ctx) {
        return false;
    }
    match predicate.evaluate(item, ctx) {
        Ok(matched) => matched,
        Err(error) => {
            tracing::debug!(rule = %binding.name, item = item.address(), %error, "Rule evaluation failed");
            false
        }
    }
}

/// Earliest binding that matches `item`.
pub fn first_match<'a>(
    item: &ItemRecord,
    set: &'a RuleSet,
    ctx: &EvalContext<'_>,
) -> Option<&'a RuleBinding> {
    set.bindings()
        .iter()
        .find(|binding| binding_matches(binding, item, ctx))
}

pub fn matches(item: &ItemRecord, set: &RuleSet, ctx: &EvalContext<'_>) -> bool {
    first_match(item, set, ctx).is_some()
}

/// Color of the first matching binding, `default` when nothing matches.
pub fn color_for(item: &ItemRecord, set: &RuleSet, ctx: &EvalContext<'_>, default: Color) -> Color {
    first_match(item, set, ctx).map_or(default, |binding| binding.color)
}

/// Color of the first binding that matches any of `items`.
///
/// Precedence is by binding, not by item: an earlier rule matching the last
/// item beats a later rule matching the first one.
pub fn color_for_any(
    items: &[ItemRecord],
    set: &RuleSet,
    ctx: &EvalContext<'_>,
    default: Color,
) -> Color {
    set.bindings()
        .iter()
        .find(|binding| items.iter().any(|item| binding_matches(binding, item, ctx)))
        .map_or(default, |binding| binding.color)
}

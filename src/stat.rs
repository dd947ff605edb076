//! Contention statistics: the feedback rule that drives split/join
//! decisions.

use crate::config::TreeConfig;
use crate::imm_set::ImmutableSet;
use crate::node::BaseKind;
use crate::node::BaseNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContInfo {
    Contended,
    Uncontended,
    /// Used by `adapt_if_needed`, which only reads the existing stat.
    NoInfo,
}

/// The contention contribution a range query, once it spans more than one
/// base, subtracts from that base's stat update (biasing it away from
/// further splitting just because it served a wide scan).
fn range_sub<S: ImmutableSet>(node: &BaseNode<S>, cfg: &TreeConfig) -> i32 {
    match &node.kind {
        BaseKind::Range(range) if range.storage.more_than_one_base() => cfg.range_contrib,
        _ => 0,
    }
}

/// Pure function computing the next `stat` value for `node` given `info`.
pub fn new_stat<S: ImmutableSet>(node: &BaseNode<S>, info: ContInfo, cfg: &TreeConfig) -> i32 {
    let sub = range_sub(node, cfg);
    match info {
        ContInfo::Contended if node.stat <= cfg.high_cont => node.stat + cfg.cont_contrib - sub,
        ContInfo::Uncontended if node.stat >= cfg.low_cont => {
            node.stat - cfg.low_cont_contrib - sub
        }
        _ => node.stat,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adaptation {
    None,
    Split,
    Join,
}

/// Decide what `adapt_if_needed` should do for a base, purely from its
/// current stat (the caller is responsible for the `is_replaceable` check).
pub fn decide_adaptation<S: ImmutableSet>(node: &BaseNode<S>, cfg: &TreeConfig) -> Adaptation {
    let projected = new_stat(node, ContInfo::NoInfo, cfg);
    if projected > cfg.high_cont {
        Adaptation::Split
    } else if projected < cfg.low_cont {
        Adaptation::Join
    } else {
        Adaptation::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atm::Atomic;
    use crate::imm_set::{ImmutableSet, SortedSet};
    use crate::node::Node;

    fn base_with_stat(stat: i32) -> BaseNode<SortedSet> {
        BaseNode::normal(SortedSet::empty(), stat, Atomic::<Node<SortedSet>>::null())
    }

    #[test]
    fn contended_increases_stat() {
        let cfg = TreeConfig::default();
        let base = base_with_stat(0);
        assert_eq!(new_stat(&base, ContInfo::Contended, &cfg), cfg.cont_contrib);
    }

    #[test]
    fn uncontended_decreases_stat() {
        let cfg = TreeConfig::default();
        let base = base_with_stat(0);
        assert_eq!(
            new_stat(&base, ContInfo::Uncontended, &cfg),
            -cfg.low_cont_contrib
        );
    }

    #[test]
    fn contended_saturates_past_high_cont() {
        let cfg = TreeConfig::default();
        let base = base_with_stat(cfg.high_cont + 1);
        assert_eq!(new_stat(&base, ContInfo::Contended, &cfg), cfg.high_cont + 1);
    }

    #[test]
    fn decide_adaptation_thresholds() {
        let cfg = TreeConfig::default();
        assert_eq!(
            decide_adaptation(&base_with_stat(cfg.high_cont + 10), &cfg),
            Adaptation::Split
        );
        assert_eq!(
            decide_adaptation(&base_with_stat(cfg.low_cont - 10), &cfg),
            Adaptation::Join
        );
        assert_eq!(decide_adaptation(&base_with_stat(0), &cfg), Adaptation::None);
    }
}

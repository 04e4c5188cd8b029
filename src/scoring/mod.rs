pub mod behavioral;
pub mod bot;
pub mod login;
pub mod oracle;
pub mod transaction;

/// Response tier selected by comparing a score against two thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Allow,
    Challenge,
    Block,
}

/// Map a score onto a tier. Comparisons are strict `>` on both boundaries:
/// a score exactly at the block threshold still only challenges, and a score
/// exactly at the challenge threshold still allows.
pub fn classify(score: f64, challenge_above: f64, block_above: f64) -> Tier {
    if score > block_above {
        Tier::Block
    } else if score > challenge_above {
        Tier::Challenge
    } else {
        Tier::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_are_strict() {
        // Exactly at the block threshold: challenge, not block.
        assert_eq!(classify(0.70, 0.4, 0.7), Tier::Challenge);
        assert_eq!(classify(0.7000001, 0.4, 0.7), Tier::Block);

        // Exactly at the challenge threshold: allow.
        assert_eq!(classify(0.4, 0.4, 0.7), Tier::Allow);
        assert_eq!(classify(0.4000001, 0.4, 0.7), Tier::Challenge);
    }

    #[test]
    fn test_scores_above_one_still_block() {
        // Weights are additive and unbounded; nothing clamps them.
        assert_eq!(classify(1.6, 0.4, 0.7), Tier::Block);
    }
}

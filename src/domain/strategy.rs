//! Strategy configuration: ranking, entry rule and exit parameters.

use crate::domain::factor::{Factor, FactorRef};
use crate::domain::position::Side;
use crate::domain::rule::{Operand, Rule};

/// Entry rule used when the configuration does not provide one.
pub const DEFAULT_ENTRY_RULE: &str = "AND(CONSECUTIVE(ABOVE(close, ma5), 4), ABOVE(ma5, ma20), \
     ABOVE(volume, volume_ma10 * 2), BELOW(volume, volume_ma10 * 7), ABOVE(adx, 45))";

/// Trailing-stop parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitParams {
    /// Stop distance in ATRs below the running high (above the running low
    /// for shorts).
    pub atr_multiplier: f64,
    /// ATR is capped at this percentage of the entry price. `None` disables
    /// the cap.
    pub atr_cap_pct: Option<f64>,
}

impl Default for ExitParams {
    fn default() -> Self {
        Self {
            atr_multiplier: 0.7,
            atr_cap_pct: Some(3.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Strategy {
    pub name: String,
    pub description: String,
    pub side: Side,
    /// Cross-sectional ranking column, sorted descending.
    pub rank_by: FactorRef,
    pub top_n: usize,
    pub entry_rule: Rule,
    pub exit: ExitParams,
}

impl Strategy {
    /// Ranking column first, then every column the entry rule reads.
    pub fn audit_columns(&self) -> Vec<FactorRef> {
        let mut cols = vec![self.rank_by];
        cols.extend(
            self.entry_rule
                .referenced_columns()
                .into_iter()
                .filter(|c| *c != self.rank_by),
        );
        cols
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            name: "momentum".into(),
            description: "Top ROC64 movers with a volume burst and strong trend".into(),
            side: Side::Long,
            rank_by: FactorRef::current(Factor::Roc(64)),
            top_n: 30,
            entry_rule: default_entry_rule(),
            exit: ExitParams::default(),
        }
    }
}

/// The AST of [`DEFAULT_ENTRY_RULE`].
pub fn default_entry_rule() -> Rule {
    let col = |f: Factor| Operand::Column(FactorRef::current(f));
    let volume_ma = |multiplier: f64| Operand::Scaled {
        column: FactorRef::current(Factor::VolumeMa(10)),
        multiplier,
    };
    Rule::And(vec![
        Rule::Consecutive {
            rule: Box::new(Rule::Above {
                left: col(Factor::Close),
                right: col(Factor::Ma(5)),
            }),
            count: 4,
        },
        Rule::Above {
            left: col(Factor::Ma(5)),
            right: col(Factor::Ma(20)),
        },
        Rule::Above {
            left: col(Factor::Volume),
            right: volume_ma(2.0),
        },
        Rule::Below {
            left: col(Factor::Volume),
            right: volume_ma(7.0),
        },
        Rule::Above {
            left: col(Factor::Adx),
            right: Operand::Constant(45.0),
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule_parser::parse;

    #[test]
    fn default_rule_matches_text() {
        assert_eq!(parse(DEFAULT_ENTRY_RULE).unwrap(), default_entry_rule());
    }

    #[test]
    fn default_strategy_fields() {
        let s = Strategy::default();
        assert_eq!(s.side, Side::Long);
        assert_eq!(s.rank_by.to_string(), "roc64");
        assert_eq!(s.top_n, 30);
        assert_eq!(s.exit.atr_multiplier, 0.7);
        assert_eq!(s.exit.atr_cap_pct, Some(3.0));
    }

    #[test]
    fn audit_columns_lead_with_rank() {
        let s = Strategy::default();
        let names: Vec<String> = s.audit_columns().iter().map(|c| c.to_string()).collect();
        assert_eq!(names[0], "roc64");
        for expected in ["close", "volume", "ma5", "ma20", "volume_ma10", "adx"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn audit_columns_skip_duplicate_rank() {
        let s = Strategy {
            rank_by: FactorRef::current(Factor::Adx),
            ..Strategy::default()
        };
        let adx_count = s
            .audit_columns()
            .iter()
            .filter(|c| c.factor == Factor::Adx)
            .count();
        assert_eq!(adx_count, 1);
    }
}

//! Rule AST data structures.
//!
//! - `Operand`: what can be compared (a constant, a factor column, or a
//!   factor column scaled by a constant)
//! - `Rule`: comparison, composite and temporal variants

use crate::domain::factor::FactorRef;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Constant(f64),
    Column(FactorRef),
    /// `column * multiplier`, e.g. `volume_ma10 * 2`.
    Scaled { column: FactorRef, multiplier: f64 },
}

impl Operand {
    /// The column this operand reads, if any.
    pub fn column(&self) -> Option<FactorRef> {
        match self {
            Operand::Constant(_) => None,
            Operand::Column(c) | Operand::Scaled { column: c, .. } => Some(*c),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    CrossAbove {
        left: Operand,
        right: Operand,
    },
    CrossBelow {
        left: Operand,
        right: Operand,
    },
    Above {
        left: Operand,
        right: Operand,
    },
    Below {
        left: Operand,
        right: Operand,
    },
    Between {
        operand: Operand,
        lower: f64,
        upper: f64,
    },
    Equals {
        left: Operand,
        right: Operand,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
    Consecutive {
        rule: Box<Rule>,
        count: usize,
    },
    AnyOf {
        rule: Box<Rule>,
        count: usize,
    },
}

impl Rule {
    /// Every column the rule reads, deduplicated and sorted.
    pub fn referenced_columns(&self) -> BTreeSet<FactorRef> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<FactorRef>) {
        match self {
            Rule::CrossAbove { left, right }
            | Rule::CrossBelow { left, right }
            | Rule::Above { left, right }
            | Rule::Below { left, right }
            | Rule::Equals { left, right } => {
                out.extend(left.column());
                out.extend(right.column());
            }
            Rule::Between { operand, .. } => out.extend(operand.column()),
            Rule::And(rules) | Rule::Or(rules) => {
                for r in rules {
                    r.collect_columns(out);
                }
            }
            Rule::Not(rule) | Rule::Consecutive { rule, .. } | Rule::AnyOf { rule, .. } => {
                rule.collect_columns(out);
            }
        }
    }

    /// Bars of history the rule needs beyond the current one.
    pub fn lookback(&self) -> usize {
        match self {
            Rule::CrossAbove { .. } | Rule::CrossBelow { .. } => 1,
            Rule::Above { .. } | Rule::Below { .. } | Rule::Between { .. } | Rule::Equals { .. } => {
                0
            }
            Rule::And(rules) | Rule::Or(rules) => {
                rules.iter().map(Rule::lookback).max().unwrap_or(0)
            }
            Rule::Not(rule) => rule.lookback(),
            Rule::Consecutive { rule, count } | Rule::AnyOf { rule, count } => {
                rule.lookback() + count.saturating_sub(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::factor::Factor;

    fn col(f: Factor) -> Operand {
        Operand::Column(FactorRef::current(f))
    }

    #[test]
    fn operand_column_lookup() {
        assert_eq!(Operand::Constant(1.0).column(), None);
        assert_eq!(
            col(Factor::Close).column(),
            Some(FactorRef::current(Factor::Close))
        );
        let scaled = Operand::Scaled {
            column: FactorRef::lagged(Factor::VolumeMa(10), 1),
            multiplier: 2.0,
        };
        assert_eq!(
            scaled.column(),
            Some(FactorRef::lagged(Factor::VolumeMa(10), 1))
        );
    }

    #[test]
    fn referenced_columns_walks_tree() {
        let rule = Rule::And(vec![
            Rule::Consecutive {
                rule: Box::new(Rule::Above {
                    left: col(Factor::Close),
                    right: col(Factor::Ma(5)),
                }),
                count: 4,
            },
            Rule::Not(Box::new(Rule::Between {
                operand: col(Factor::Adx),
                lower: 10.0,
                upper: 20.0,
            })),
            Rule::Below {
                left: col(Factor::Close),
                right: Operand::Constant(1.0),
            },
        ]);
        let cols: Vec<String> = rule
            .referenced_columns()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(cols, vec!["close", "ma5", "adx"]);
    }

    #[test]
    fn lookback_of_temporal_rules() {
        let cross = Rule::CrossAbove {
            left: col(Factor::Ma(5)),
            right: col(Factor::Ma(20)),
        };
        assert_eq!(cross.lookback(), 1);

        let consecutive = Rule::Consecutive {
            rule: Box::new(cross.clone()),
            count: 3,
        };
        assert_eq!(consecutive.lookback(), 3);

        let nested = Rule::Or(vec![
            consecutive,
            Rule::Above {
                left: col(Factor::Close),
                right: Operand::Constant(1.0),
            },
        ]);
        assert_eq!(nested.lookback(), 3);
    }
}

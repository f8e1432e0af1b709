use std::rc::Rc;

use pra_expr::{Constant, ExprRef, Product};

use crate::event::{BasicEvent, Gate};
use crate::formula::{basic_arg, Connective, Formula};
use crate::model::ModelError;

/// The common-cause-failure model governing how a group's combined factor
/// table is interpreted. `scram`'s `ccf_group.h` supports the same four
/// models; only the purely structural expansion (which combinations of
/// members get a synthetic gate, and which factor weights them) is modelled
/// here — the factor *values* remain opaque [`pra_expr::Expression`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcfModel {
    BetaFactor,
    Mgl,
    AlphaFactor,
    PhiFactor,
}

/// One entry of a CCF group's factor table: the combination order it
/// applies to (1 = independent failure, up to the group size) and the
/// expression giving its weight.
#[derive(Debug, Clone)]
pub struct CcfFactor {
    pub order: u32,
    pub factor: ExprRef,
}

/// A named common-cause-failure group.
#[derive(Debug)]
pub struct CcfGroup {
    pub name: String,
    pub model: CcfModel,
    members: Vec<Rc<BasicEvent>>,
    distribution: Option<ExprRef>,
    factors: Vec<CcfFactor>,
}

impl CcfGroup {
    pub fn new(name: impl Into<String>, model: CcfModel) -> Self {
        CcfGroup {
            name: name.into(),
            model,
            members: Vec::new(),
            distribution: None,
            factors: Vec::new(),
        }
    }

    pub fn add_member(&mut self, event: Rc<BasicEvent>) -> Result<(), ModelError> {
        if self.members.iter().any(|m| m.id == event.id) {
            return Err(ModelError::DuplicateId(format!(
                "basic event {} already a member of CCF group {}",
                event.name, self.name
            )));
        }
        self.members.push(event);
        Ok(())
    }

    pub fn add_distribution(&mut self, expr: ExprRef) -> Result<(), ModelError> {
        if self.distribution.is_some() {
            return Err(ModelError::InvalidFormula(format!(
                "CCF group {} already has a distribution",
                self.name
            )));
        }
        self.distribution = Some(expr);
        Ok(())
    }

    pub fn add_factor(&mut self, order: u32, factor: ExprRef) -> Result<(), ModelError> {
        if self.members.is_empty() {
            return Err(ModelError::InvalidFormula(format!(
                "CCF group {} has no members to apply factors to",
                self.name
            )));
        }
        self.factors.push(CcfFactor { order, factor });
        Ok(())
    }

    pub fn members(&self) -> &[Rc<BasicEvent>] {
        &self.members
    }

    /// Expand the group into one AND-gate per `k`-combination of members,
    /// for each order `k` present in the factor table, weighted by that
    /// order's factor expression multiplied by the group's shared
    /// distribution (if any). Each gate is paired with the member indices
    /// (into [`Self::members`]) it covers, so the caller can build one
    /// OR-of-combos substitute gate per member and splice it in wherever
    /// the model references that member directly.
    pub fn expand(&self) -> Result<Vec<(Vec<usize>, Rc<Gate>)>, ModelError> {
        if self.members.len() < 2 {
            return Err(ModelError::InvalidFormula(format!(
                "CCF group {} needs at least two members",
                self.name
            )));
        }
        let mut gates = Vec::new();
        for factor in &self.factors {
            let order = factor.order as usize;
            if order == 0 || order > self.members.len() {
                return Err(ModelError::CcfSizeMismatch {
                    group: self.name.clone(),
                    order: factor.order,
                    size: self.members.len(),
                });
            }
            let weight: ExprRef = match &self.distribution {
                Some(dist) => Rc::new(Product(vec![Rc::clone(dist), Rc::clone(&factor.factor)])),
                None => Rc::clone(&factor.factor),
            };
            for combo in combinations(self.members.len(), order) {
                let args = combo
                    .iter()
                    .map(|&i| basic_arg(&self.members[i], false))
                    .collect::<Vec<_>>();
                let surrogate =
                    BasicEvent::new(format!("{}#ccf-surrogate-{order}", self.name), weight.clone());
                let and_formula =
                    Formula::new(Connective::And, {
                        let mut a = args;
                        a.push(basic_arg(&surrogate, false));
                        a
                    })
                    .expect("well-formed AND of >=1 member plus surrogate");
                let gate = Gate::new(
                    format!("{}#ccf-combo-{}", self.name, combo_label(&combo)),
                    and_formula,
                );
                gates.push((combo, gate));
            }
        }
        Ok(gates)
    }
}

fn combo_label(combo: &[usize]) -> String {
    combo
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

/// All `k`-combinations of `0..n` in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        result.push(current.clone());
        let mut i = k;
        loop {
            if i == 0 {
                return result;
            }
            i -= 1;
            if current[i] != i + n - k {
                break;
            }
        }
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

#[allow(dead_code)]
fn constant_expr(v: f64) -> ExprRef {
    Rc::new(Constant(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pra_expr::Constant;

    #[test]
    fn combinations_2_of_3() {
        let c = combinations(3, 2);
        assert_eq!(c, vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
    }

    #[test]
    fn beta_factor_group_expands_one_gate_per_combination() {
        let mut group = CcfGroup::new("g", CcfModel::BetaFactor);
        let a = BasicEvent::new("a", constant_expr(0.01));
        let b = BasicEvent::new("b", constant_expr(0.01));
        let c = BasicEvent::new("c", constant_expr(0.01));
        group.add_member(a).unwrap();
        group.add_member(b).unwrap();
        group.add_member(c).unwrap();
        group.add_factor(2, constant_expr(0.05)).unwrap();
        group.add_factor(3, constant_expr(0.01)).unwrap();
        let gates = group.expand().unwrap();
        // C(3,2) = 3 gates for order 2, C(3,3) = 1 gate for order 3.
        assert_eq!(gates.len(), 4);
        assert_eq!(gates.iter().filter(|(combo, _)| combo.len() == 2).count(), 3);
        assert_eq!(gates.iter().filter(|(combo, _)| combo.len() == 3).count(), 1);
    }

    #[test]
    fn duplicate_member_rejected() {
        let mut group = CcfGroup::new("g", CcfModel::Mgl);
        let a = BasicEvent::new("a", constant_expr(0.01));
        group.add_member(Rc::clone(&a)).unwrap();
        assert!(group.add_member(a).is_err());
    }
}

//! A small DPLL satisfiability solver.
//!
//! Two watched literals per clause, chronological backtracking, a fixed
//! variable order with saved phases. Search stops with [`SatResult::Unknown`]
//! when the conflict budget or the deadline runs out.

use std::ops::Not;
use std::time::Instant;

/// A literal: variable index and polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit(u32);

impl Lit {
    /// The positive literal of `var`.
    #[inline]
    pub fn pos(var: u32) -> Self {
        Lit(var << 1)
    }

    /// The negative literal of `var`.
    #[inline]
    pub fn neg(var: u32) -> Self {
        Lit((var << 1) | 1)
    }

    /// Variable index.
    #[inline]
    pub fn var(self) -> u32 {
        self.0 >> 1
    }

    /// Whether the literal is negated.
    #[inline]
    pub fn is_neg(self) -> bool {
        self.0 & 1 == 1
    }

    #[inline]
    fn code(self) -> usize {
        self.0 as usize
    }
}

impl Not for Lit {
    type Output = Lit;

    #[inline]
    fn not(self) -> Lit {
        Lit(self.0 ^ 1)
    }
}

/// A formula in conjunctive normal form.
#[derive(Debug, Clone, Default)]
pub struct Cnf {
    num_vars: u32,
    clauses: Vec<Vec<Lit>>,
}

impl Cnf {
    /// An empty formula.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh variable.
    pub fn new_var(&mut self) -> u32 {
        self.num_vars += 1;
        self.num_vars - 1
    }

    /// Add a clause (the disjunction of `lits`).
    pub fn add_clause(&mut self, lits: Vec<Lit>) {
        self.clauses.push(lits);
    }

    /// Number of variables.
    #[inline]
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Number of clauses.
    #[inline]
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Require at most `k` of `lits` to be true (sequential counter).
    pub fn at_most(&mut self, lits: &[Lit], k: usize) {
        let n = lits.len();
        if k >= n {
            return;
        }
        if k == 0 {
            for &x in lits {
                self.add_clause(vec![!x]);
            }
            return;
        }
        // s[i][j]: at least j + 1 of lits[0..=i] are true.
        let s: Vec<Vec<u32>> = (0..n - 1)
            .map(|_| (0..k).map(|_| self.new_var()).collect())
            .collect();
        self.add_clause(vec![!lits[0], Lit::pos(s[0][0])]);
        for j in 1..k {
            self.add_clause(vec![Lit::neg(s[0][j])]);
        }
        for i in 1..n - 1 {
            self.add_clause(vec![!lits[i], Lit::pos(s[i][0])]);
            self.add_clause(vec![Lit::neg(s[i - 1][0]), Lit::pos(s[i][0])]);
            for j in 1..k {
                self.add_clause(vec![!lits[i], Lit::neg(s[i - 1][j - 1]), Lit::pos(s[i][j])]);
                self.add_clause(vec![Lit::neg(s[i - 1][j]), Lit::pos(s[i][j])]);
            }
            self.add_clause(vec![!lits[i], Lit::neg(s[i - 1][k - 1])]);
        }
        self.add_clause(vec![!lits[n - 1], Lit::neg(s[n - 2][k - 1])]);
    }

    /// Require at least `k` of `lits` to be true.
    pub fn at_least(&mut self, lits: &[Lit], k: usize) {
        if k == 0 {
            return;
        }
        if k > lits.len() {
            self.add_clause(Vec::new());
            return;
        }
        let negated: Vec<Lit> = lits.iter().map(|&l| !l).collect();
        self.at_most(&negated, lits.len() - k);
    }
}

/// Outcome of [`solve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResult {
    /// A satisfying assignment, indexed by variable.
    Sat(Vec<bool>),
    /// No assignment exists.
    Unsat,
    /// A budget ran out first.
    Unknown,
}

/// Search limits.
#[derive(Debug, Clone, Copy)]
pub struct SatLimits {
    /// Conflicts allowed before giving up.
    pub max_conflicts: u64,
    /// Wall-clock deadline.
    pub deadline: Option<Instant>,
}

const UNASSIGNED: i8 = -1;

struct Solver {
    clauses: Vec<Vec<Lit>>,
    watches: Vec<Vec<usize>>,
    value: Vec<i8>,
    phase: Vec<bool>,
    trail: Vec<Lit>,
    levels: Vec<(usize, Lit, bool)>,
    head: usize,
    cursor: usize,
}

impl Solver {
    #[inline]
    fn lit_value(&self, l: Lit) -> i8 {
        match self.value[l.var() as usize] {
            UNASSIGNED => UNASSIGNED,
            v => v ^ l.is_neg() as i8,
        }
    }

    fn assign(&mut self, l: Lit) {
        self.value[l.var() as usize] = !l.is_neg() as i8;
        self.trail.push(l);
    }

    fn undo_to(&mut self, len: usize) {
        while self.trail.len() > len {
            if let Some(l) = self.trail.pop() {
                let var = l.var() as usize;
                self.phase[var] = !l.is_neg();
                self.value[var] = UNASSIGNED;
                self.cursor = self.cursor.min(var);
            }
        }
        self.head = self.head.min(len);
    }

    /// Unit propagation; returns `false` on a conflict.
    fn propagate(&mut self) -> bool {
        while self.head < self.trail.len() {
            let falsified = !self.trail[self.head];
            self.head += 1;
            let mut watching = std::mem::take(&mut self.watches[falsified.code()]);
            let mut ok = true;
            let mut i = 0;
            while i < watching.len() {
                let ci = watching[i];
                if self.clauses[ci][0] == falsified {
                    self.clauses[ci].swap(0, 1);
                }
                let first = self.clauses[ci][0];
                if self.lit_value(first) == 1 {
                    i += 1;
                    continue;
                }
                let replacement =
                    (2..self.clauses[ci].len()).find(|&k| self.lit_value(self.clauses[ci][k]) != 0);
                if let Some(k) = replacement {
                    self.clauses[ci].swap(1, k);
                    let watched = self.clauses[ci][1];
                    self.watches[watched.code()].push(ci);
                    watching.swap_remove(i);
                    continue;
                }
                if self.lit_value(first) == 0 {
                    ok = false;
                    break;
                }
                self.assign(first);
                i += 1;
            }
            self.watches[falsified.code()] = watching;
            if !ok {
                return false;
            }
        }
        true
    }
}

/// Decide satisfiability of `cnf` within `limits`.
pub fn solve(cnf: &Cnf, limits: &SatLimits) -> SatResult {
    let n = cnf.num_vars as usize;
    let mut solver = Solver {
        clauses: Vec::new(),
        watches: vec![Vec::new(); 2 * n],
        value: vec![UNASSIGNED; n],
        phase: vec![false; n],
        trail: Vec::new(),
        levels: Vec::new(),
        head: 0,
        cursor: 0,
    };

    let mut units = Vec::new();
    for clause in &cnf.clauses {
        let mut lits = clause.clone();
        lits.sort_unstable();
        lits.dedup();
        if lits.windows(2).any(|w| w[0] == !w[1]) {
            continue;
        }
        match lits.len() {
            0 => return SatResult::Unsat,
            1 => units.push(lits[0]),
            _ => {
                let ci = solver.clauses.len();
                solver.watches[lits[0].code()].push(ci);
                solver.watches[lits[1].code()].push(ci);
                solver.clauses.push(lits);
            }
        }
    }
    for l in units {
        match solver.lit_value(l) {
            0 => return SatResult::Unsat,
            1 => {}
            _ => solver.assign(l),
        }
    }

    let mut conflicts = 0u64;
    loop {
        if !solver.propagate() {
            conflicts += 1;
            if conflicts > limits.max_conflicts {
                return SatResult::Unknown;
            }
            if conflicts % 256 == 0 && limits.deadline.is_some_and(|d| Instant::now() >= d) {
                return SatResult::Unknown;
            }
            loop {
                let Some((start, decision, flipped)) = solver.levels.pop() else {
                    return SatResult::Unsat;
                };
                solver.undo_to(start);
                if !flipped {
                    solver.levels.push((start, !decision, true));
                    solver.assign(!decision);
                    break;
                }
            }
            continue;
        }

        while solver.cursor < n && solver.value[solver.cursor] != UNASSIGNED {
            solver.cursor += 1;
        }
        if solver.cursor == n {
            return SatResult::Sat(solver.value.iter().map(|&v| v == 1).collect());
        }
        let var = solver.cursor as u32;
        let decision = if solver.phase[var as usize] {
            Lit::pos(var)
        } else {
            Lit::neg(var)
        };
        solver.levels.push((solver.trail.len(), decision, false));
        solver.assign(decision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SatLimits {
        SatLimits {
            max_conflicts: 100_000,
            deadline: None,
        }
    }

    fn count_true(model: &[bool], vars: &[u32]) -> usize {
        vars.iter().filter(|&&v| model[v as usize]).count()
    }

    fn satisfies(cnf: &Cnf, model: &[bool]) -> bool {
        cnf.clauses.iter().all(|c| {
            c.iter()
                .any(|&l| model[l.var() as usize] != l.is_neg())
        })
    }

    #[test]
    fn test_simple_sat() {
        let mut cnf = Cnf::new();
        let (a, b) = (cnf.new_var(), cnf.new_var());
        cnf.add_clause(vec![Lit::pos(a), Lit::pos(b)]);
        cnf.add_clause(vec![Lit::neg(a)]);
        match solve(&cnf, &limits()) {
            SatResult::Sat(model) => {
                assert!(!model[a as usize]);
                assert!(model[b as usize]);
            }
            other => panic!("expected sat, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_unsat() {
        let mut cnf = Cnf::new();
        let (a, b) = (cnf.new_var(), cnf.new_var());
        for (x, y) in [(true, true), (true, false), (false, true), (false, false)] {
            let la = if x { Lit::pos(a) } else { Lit::neg(a) };
            let lb = if y { Lit::pos(b) } else { Lit::neg(b) };
            cnf.add_clause(vec![la, lb]);
        }
        assert_eq!(solve(&cnf, &limits()), SatResult::Unsat);
    }

    #[test]
    fn test_pigeonhole_three_into_two() {
        // p[i][h]: pigeon i sits in hole h.
        let mut cnf = Cnf::new();
        let p: Vec<Vec<u32>> = (0..3).map(|_| (0..2).map(|_| cnf.new_var()).collect()).collect();
        for row in &p {
            cnf.add_clause(row.iter().map(|&v| Lit::pos(v)).collect());
        }
        for h in 0..2 {
            let hole: Vec<Lit> = p.iter().map(|row| Lit::pos(row[h])).collect();
            cnf.at_most(&hole, 1);
        }
        assert_eq!(solve(&cnf, &limits()), SatResult::Unsat);
    }

    #[test]
    fn test_cardinality_bounds() {
        for n in 1..6usize {
            for k in 0..=n {
                let mut cnf = Cnf::new();
                let vars: Vec<u32> = (0..n).map(|_| cnf.new_var()).collect();
                let lits: Vec<Lit> = vars.iter().map(|&v| Lit::pos(v)).collect();
                cnf.at_most(&lits, k);
                cnf.at_least(&lits, k);
                match solve(&cnf, &limits()) {
                    SatResult::Sat(model) => {
                        assert_eq!(count_true(&model, &vars), k, "n={} k={}", n, k);
                        assert!(satisfies(&cnf, &model));
                    }
                    other => panic!("n={} k={}: {:?}", n, k, other),
                }
            }
        }
    }

    #[test]
    fn test_at_least_more_than_available() {
        let mut cnf = Cnf::new();
        let lits: Vec<Lit> = (0..2).map(|_| Lit::pos(cnf.new_var())).collect();
        cnf.at_least(&lits, 3);
        assert_eq!(solve(&cnf, &limits()), SatResult::Unsat);
    }

    #[test]
    fn test_conflict_budget() {
        let mut cnf = Cnf::new();
        let p: Vec<Vec<u32>> = (0..6).map(|_| (0..5).map(|_| cnf.new_var()).collect()).collect();
        for row in &p {
            cnf.add_clause(row.iter().map(|&v| Lit::pos(v)).collect());
        }
        for h in 0..5 {
            let hole: Vec<Lit> = p.iter().map(|row| Lit::pos(row[h])).collect();
            cnf.at_most(&hole, 1);
        }
        let tight = SatLimits {
            max_conflicts: 3,
            deadline: None,
        };
        assert_eq!(solve(&cnf, &tight), SatResult::Unknown);
    }
}

use crate::term::{Solution, Term};

/// A resolved solution set.
///
/// One captured set, two views: [`Selection::each`] invokes a callback once
/// per row, [`Selection::all`] once with the whole slice. Every delivery
/// assigns fresh `_id` ordinals to its rows; they exist purely so renderers
/// have a stable key within one delivery and carry no store semantics.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    solutions: Vec<Solution>,
}

impl Selection {
    pub fn new(mut solutions: Vec<Solution>) -> Self {
        for (i, solution) in solutions.iter_mut().enumerate() {
            solution.insert("_id".to_string(), Term::number(i as f64));
        }
        Self { solutions }
    }

    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// Per-row view over the captured set.
    pub fn each<F: FnMut(&Solution)>(&self, mut f: F) {
        for solution in &self.solutions {
            f(solution);
        }
    }

    /// Whole-set view over the captured set.
    pub fn all<F: FnOnce(&[Solution])>(&self, f: F) {
        f(&self.solutions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(x: f64) -> Solution {
        let mut sol = Solution::new();
        sol.insert("x".to_string(), Term::number(x));
        sol
    }

    #[test]
    fn assigns_fresh_ordinals_per_delivery() {
        let selection = Selection::new(vec![row(5.0), row(6.0)]);
        assert_eq!(selection.solutions()[0].get("_id"), Some(&Term::number(0.0)));
        assert_eq!(selection.solutions()[1].get("_id"), Some(&Term::number(1.0)));
    }

    #[test]
    fn each_and_all_view_the_same_set() {
        let selection = Selection::new(vec![row(1.0), row(2.0), row(3.0)]);

        let mut per_row = 0;
        selection.each(|_| per_row += 1);
        assert_eq!(per_row, 3);

        let mut whole = 0;
        selection.all(|rows| whole = rows.len());
        assert_eq!(whole, 3);
    }
}

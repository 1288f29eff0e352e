//! Cost and assignment matrices.
//!
//! Both are dense and row-major: rows are targets, columns are enumerators.

use crate::traits::Id;

/// Target x enumerator travel costs, labelled by id.
///
/// A cell is `None` when the cost is unknown (the provider failed for it).
/// Known cells are always finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix<I> {
    target_ids: Vec<I>,
    enum_ids: Vec<I>,
    cells: Vec<Option<f64>>,
}

impl<I: Id> CostMatrix<I> {
    /// Build a matrix from per-target rows.
    ///
    /// Rows shorter or longer than `enum_ids` and missing rows become
    /// unknown; negative or non-finite values become unknown.
    pub fn from_rows(target_ids: Vec<I>, enum_ids: Vec<I>, rows: Vec<Vec<Option<f64>>>) -> Self {
        let n_cols = enum_ids.len();
        let mut rows = rows.into_iter();
        let mut cells = Vec::with_capacity(target_ids.len() * n_cols);

        for _ in 0..target_ids.len() {
            match rows.next() {
                Some(row) if row.len() == n_cols => {
                    cells.extend(row.into_iter().map(sanitize));
                }
                _ => cells.extend(std::iter::repeat(None).take(n_cols)),
            }
        }

        Self {
            target_ids,
            enum_ids,
            cells,
        }
    }

    /// Build a fully known matrix from plain values.
    pub fn from_values(target_ids: Vec<I>, enum_ids: Vec<I>, rows: Vec<Vec<f64>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Some).collect())
            .collect();
        Self::from_rows(target_ids, enum_ids, rows)
    }

    /// Row labels.
    pub fn target_ids(&self) -> &[I] {
        &self.target_ids
    }

    /// Column labels.
    pub fn enum_ids(&self) -> &[I] {
        &self.enum_ids
    }

    /// Dimensions as `(targets, enumerators)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.target_ids.len(), self.enum_ids.len())
    }

    /// Cost of one cell; `None` when unknown or out of range.
    pub fn get(&self, target: usize, enumerator: usize) -> Option<f64> {
        if enumerator >= self.enum_ids.len() {
            return None;
        }
        self.cells
            .get(target * self.enum_ids.len() + enumerator)
            .copied()
            .flatten()
    }

    /// Costs from one target to every enumerator.
    pub fn row(&self, target: usize) -> &[Option<f64>] {
        let n_cols = self.enum_ids.len();
        let start = (target * n_cols).min(self.cells.len());
        let end = (start + n_cols).min(self.cells.len());
        &self.cells[start..end]
    }

    /// Number of unknown cells.
    pub fn unknown_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_none()).count()
    }

    /// Index of the first target with no known cost to any enumerator.
    pub fn first_unreachable_target(&self) -> Option<usize> {
        (0..self.target_ids.len()).find(|&i| self.row(i).iter().all(Option::is_none))
    }

    /// The smallest `max_cost` that can be satisfied: the maximum, over
    /// targets, of each target's cheapest known cost.
    ///
    /// `None` when the matrix is empty or some target has no known cost.
    pub fn max_cost_floor(&self) -> Option<f64> {
        if self.enum_ids.is_empty() {
            return None;
        }
        let mut floor: Option<f64> = None;
        for i in 0..self.target_ids.len() {
            let cheapest = self.row(i).iter().flatten().copied().reduce(f64::min)?;
            floor = Some(floor.map_or(cheapest, |current| current.max(cheapest)));
        }
        floor
    }
}

fn sanitize(cell: Option<f64>) -> Option<f64> {
    cell.filter(|value| value.is_finite() && *value >= 0.0)
}

/// Dense binary target x enumerator assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentMatrix {
    n_targets: usize,
    n_enums: usize,
    cells: Vec<bool>,
}

impl AssignmentMatrix {
    /// A matrix with nothing assigned.
    pub fn empty(n_targets: usize, n_enums: usize) -> Self {
        Self {
            n_targets,
            n_enums,
            cells: vec![false; n_targets * n_enums],
        }
    }

    /// Build from 0/1 rows. Any non-zero entry counts as assigned.
    pub fn from_rows(rows: &[Vec<u8>]) -> Self {
        let n_enums = rows.first().map_or(0, Vec::len);
        let mut matrix = Self::empty(rows.len(), n_enums);
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate().take(n_enums) {
                if *value != 0 {
                    matrix.assign(i, j);
                }
            }
        }
        matrix
    }

    pub(crate) fn assign(&mut self, target: usize, enumerator: usize) {
        if target < self.n_targets && enumerator < self.n_enums {
            self.cells[target * self.n_enums + enumerator] = true;
        }
    }

    /// Dimensions as `(targets, enumerators)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_targets, self.n_enums)
    }

    /// Whether `target` is assigned to `enumerator`.
    pub fn is_assigned(&self, target: usize, enumerator: usize) -> bool {
        enumerator < self.n_enums
            && self
                .cells
                .get(target * self.n_enums + enumerator)
                .copied()
                .unwrap_or(false)
    }

    /// Enumerators assigned to `target`, in column order.
    pub fn enumerators_of(&self, target: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_enums).filter(move |&j| self.is_assigned(target, j))
    }

    /// Number of targets assigned to each enumerator.
    pub fn column_counts(&self) -> Vec<usize> {
        (0..self.n_enums)
            .map(|j| (0..self.n_targets).filter(|&i| self.is_assigned(i, j)).count())
            .collect()
    }

    /// Number of enumerators assigned to each target.
    pub fn row_counts(&self) -> Vec<usize> {
        (0..self.n_targets)
            .map(|i| self.enumerators_of(i).count())
            .collect()
    }

    /// Sum of the assigned costs per enumerator. Unknown cells count as zero.
    pub fn column_costs<I: Id>(&self, costs: &CostMatrix<I>) -> Vec<f64> {
        (0..self.n_enums)
            .map(|j| {
                (0..self.n_targets)
                    .filter(|&i| self.is_assigned(i, j))
                    .filter_map(|i| costs.get(i, j))
                    .sum()
            })
            .collect()
    }
}

//! Dense assignment matrix to sparse assignment table.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{LocationError, PlanError};
use crate::location::LocationSet;
use crate::matrix::{AssignmentMatrix, CostMatrix};
use crate::traits::Id;

/// One assigned (target, enumerator) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRow<I> {
    pub target_id: I,
    pub enum_id: I,
    /// Cost of the pair, or `1.0` (membership) when no costs were supplied.
    pub cost: f64,
}

/// Assigned pairs in target order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentTable<I> {
    rows: Vec<AssignmentRow<I>>,
}

impl<I: Id> AssignmentTable<I> {
    pub fn new(rows: Vec<AssignmentRow<I>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[AssignmentRow<I>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<AssignmentRow<I>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows grouped by enumerator, each group in table order.
    pub fn by_enumerator(&self) -> BTreeMap<&I, Vec<&AssignmentRow<I>>> {
        let mut groups: BTreeMap<&I, Vec<&AssignmentRow<I>>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(&row.enum_id).or_default().push(row);
        }
        groups
    }

    /// Rebuild the dense matrix against the given location sets.
    pub fn to_matrix(
        &self,
        enumerators: &LocationSet<I>,
        targets: &LocationSet<I>,
    ) -> Result<AssignmentMatrix, LocationError> {
        let target_index = index_of(targets);
        let enum_index = index_of(enumerators);

        let mut matrix = AssignmentMatrix::empty(targets.len(), enumerators.len());
        for row in &self.rows {
            let i = lookup(&target_index, &row.target_id)?;
            let j = lookup(&enum_index, &row.enum_id)?;
            matrix.assign(i, j);
        }
        Ok(matrix)
    }
}

fn index_of<I: Id>(set: &LocationSet<I>) -> HashMap<&I, usize> {
    set.locations()
        .iter()
        .enumerate()
        .map(|(index, location)| (&location.id, index))
        .collect()
}

fn lookup<I: Id>(index: &HashMap<&I, usize>, id: &I) -> Result<usize, LocationError> {
    index
        .get(id)
        .copied()
        .ok_or_else(|| LocationError::UnknownId(format!("{id:?}")))
}

/// Convert `assignment` into a table with one row per assigned cell.
///
/// With `costs`, each row carries the matching cell; the matrix must have
/// the same shape as the location sets.
pub fn to_table<I: Id>(
    assignment: &AssignmentMatrix,
    enumerators: &LocationSet<I>,
    targets: &LocationSet<I>,
    costs: Option<&CostMatrix<I>>,
) -> Result<AssignmentTable<I>, PlanError> {
    let expected = (targets.len(), enumerators.len());
    let shapes = std::iter::once(assignment.shape()).chain(costs.map(CostMatrix::shape));
    for (rows, cols) in shapes {
        if (rows, cols) != expected {
            return Err(PlanError::ShapeMismatch {
                rows,
                cols,
                targets: expected.0,
                enumerators: expected.1,
            });
        }
    }

    let enum_locations = enumerators.locations();
    let mut rows = Vec::with_capacity(targets.len());
    for (i, target) in targets.locations().iter().enumerate() {
        for j in assignment.enumerators_of(i) {
            let enum_id = &enum_locations[j].id;
            let cost = match costs {
                Some(costs) => costs.get(i, j).ok_or_else(|| PlanError::UnknownCost {
                    target_id: format!("{:?}", target.id),
                    enum_id: format!("{enum_id:?}"),
                })?,
                None => 1.0,
            };
            rows.push(AssignmentRow {
                target_id: target.id.clone(),
                enum_id: enum_id.clone(),
                cost,
            });
        }
    }

    Ok(AssignmentTable::new(rows))
}

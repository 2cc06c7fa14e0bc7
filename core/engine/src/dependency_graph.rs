//! FILENAME: core/engine/src/dependency_graph.rs
//! PURPOSE: Directed graph of formula cell dependencies.
//! CONTEXT: Templates are not evaluated here, but a formula that reaches
//! itself through other formulas can never be evaluated by the report
//! runner either. The graph finds such cycles and gives the order in which
//! formula cells would have to be computed.
//!
//! TERMINOLOGY:
//! - Precedents: Cells that a formula cell references (its inputs).
//!   If cell_R3_C1 = cell_R1_C1 + cell_R2_C1, both are precedents of R3/C1.
//! - Dependents: Cells that reference a given cell (reverse lookup).
//!
//! USAGE:
//! 1. `DependencyGraph::from_template()` builds the graph from every formula
//!    cell. Only references that resolve to live cells become edges.
//! 2. `would_create_cycle()` checks a proposed formula before it is committed.
//! 3. `evaluation_order()` sorts all formula cells, or reports a cycle.

use crate::model::Template;
use formula_parser::{cell_id, resolve, scan_cell_references, Resolution};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// A cell identified by its row and column ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub row_id: String,
    pub column_id: String,
}

impl CellKey {
    pub fn new(row_id: impl Into<String>, column_id: impl Into<String>) -> Self {
        CellKey {
            row_id: row_id.into(),
            column_id: column_id.into(),
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&cell_id(&self.row_id, &self.column_id))
    }
}

/// Error type for cycle detection.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleError {
    /// The cells involved in the cycle, in order.
    pub cycle_path: Vec<CellKey>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular reference detected: ")?;
        for (i, key) in self.cycle_path.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

impl std::error::Error for CycleError {}

/// Precedents of one expression: the live cells it references.
pub fn expression_precedents(expression: &str, template: &Template) -> HashSet<CellKey> {
    scan_cell_references(expression)
        .iter()
        .filter_map(|span| match resolve(&span.key, template) {
            Resolution::Resolved { row, column } => Some(CellKey::new(row, column)),
            _ => None,
        })
        .collect()
}

/// Tracks precedents and dependents in both directions.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// For each cell, the cells it directly depends on.
    precedents: HashMap<CellKey, HashSet<CellKey>>,

    /// For each cell, the cells that directly depend on it.
    dependents: HashMap<CellKey, HashSet<CellKey>>,

    /// Every formula cell, with or without precedents.
    formulas: HashSet<CellKey>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    pub fn from_template(template: &Template) -> Self {
        let mut graph = DependencyGraph::new();
        for fc in template.formula_cells() {
            let Some(column) = template.columns().get(fc.cell_index) else {
                continue;
            };
            let key = CellKey::new(&fc.row.id, &column.id);
            let precedents = expression_precedents(fc.expression, template);
            graph.set_dependencies(key, precedents);
        }
        graph
    }

    /// Sets the dependencies for a formula cell, replacing any previous ones.
    /// This does NOT check for cycles. Use `would_create_cycle()` first if needed.
    pub fn set_dependencies(&mut self, cell: CellKey, new_precedents: HashSet<CellKey>) {
        self.clear_dependencies(&cell);
        self.formulas.insert(cell.clone());

        if !new_precedents.is_empty() {
            for prec in &new_precedents {
                self.dependents
                    .entry(prec.clone())
                    .or_default()
                    .insert(cell.clone());
            }
            self.precedents.insert(cell, new_precedents);
        }
    }

    /// Forgets a cell's formula. Call this when a cell stops being a formula.
    pub fn clear_dependencies(&mut self, cell: &CellKey) {
        self.formulas.remove(cell);
        if let Some(old_precs) = self.precedents.remove(cell) {
            for prec in old_precs {
                if let Some(deps) = self.dependents.get_mut(&prec) {
                    deps.remove(cell);
                    if deps.is_empty() {
                        self.dependents.remove(&prec);
                    }
                }
            }
        }
    }

    pub fn get_precedents(&self, cell: &CellKey) -> Option<&HashSet<CellKey>> {
        self.precedents.get(cell)
    }

    pub fn get_dependents(&self, cell: &CellKey) -> Option<&HashSet<CellKey>> {
        self.dependents.get(cell)
    }

    /// True if giving `cell` these precedents would close a cycle.
    pub fn would_create_cycle(&self, cell: &CellKey, new_precedents: &HashSet<CellKey>) -> bool {
        if new_precedents.contains(cell) {
            return true;
        }
        new_precedents.iter().any(|prec| self.can_reach(prec, cell))
    }

    /// Checks if `start` can reach `target` by following precedent chains.
    pub fn can_reach(&self, start: &CellKey, target: &CellKey) -> bool {
        let mut visited: HashSet<&CellKey> = HashSet::new();
        let mut stack = vec![start];

        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(precs) = self.precedents.get(current) {
                stack.extend(precs.iter().filter(|p| !visited.contains(p)));
            }
        }

        false
    }

    /// Every cell that depends on `cell`, directly or not.
    pub fn transitive_dependents(&self, cell: &CellKey) -> HashSet<CellKey> {
        let mut result = HashSet::new();
        let mut queue: VecDeque<&CellKey> = VecDeque::new();

        if let Some(deps) = self.dependents.get(cell) {
            queue.extend(deps.iter());
        }

        while let Some(current) = queue.pop_front() {
            if !result.insert(current.clone()) {
                continue;
            }
            if let Some(deps) = self.dependents.get(current) {
                queue.extend(deps.iter().filter(|d| !result.contains(*d)));
            }
        }

        result
    }

    /// Dependents of `changed` in the order they would be recomputed.
    pub fn recalc_order(&self, changed: &CellKey) -> Result<Vec<CellKey>, CycleError> {
        let affected = self.transitive_dependents(changed);
        if affected.is_empty() {
            return Ok(Vec::new());
        }
        self.topological_sort(&affected)
    }

    /// All formula cells, each after its precedents.
    pub fn evaluation_order(&self) -> Result<Vec<CellKey>, CycleError> {
        self.topological_sort(&self.formulas)
    }

    /// Kahn's algorithm over a subset of cells. Edges leaving the subset
    /// are ignored. Ties are broken by key order so the result is stable.
    fn topological_sort(&self, cells: &HashSet<CellKey>) -> Result<Vec<CellKey>, CycleError> {
        let mut in_degree: HashMap<&CellKey, usize> = cells.iter().map(|c| (c, 0)).collect();

        for cell in cells {
            if let Some(precs) = self.precedents.get(cell) {
                let count = precs.iter().filter(|p| cells.contains(*p)).count();
                in_degree.insert(cell, count);
            }
        }

        let mut ready: Vec<&CellKey> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&cell, _)| cell)
            .collect();
        ready.sort();
        let mut queue: VecDeque<&CellKey> = ready.into_iter().collect();

        let mut result = Vec::with_capacity(cells.len());
        while let Some(cell) = queue.pop_front() {
            result.push(cell.clone());

            if let Some(deps) = self.dependents.get(cell) {
                let mut unlocked: Vec<&CellKey> = Vec::new();
                for dep in deps {
                    if let Some(deg) = in_degree.get_mut(dep) {
                        *deg -= 1;
                        if *deg == 0 {
                            unlocked.push(dep);
                        }
                    }
                }
                unlocked.sort();
                queue.extend(unlocked);
            }
        }

        if result.len() != cells.len() {
            let mut cycle_cells: Vec<&CellKey> = in_degree
                .iter()
                .filter(|(_, &deg)| deg > 0)
                .map(|(&cell, _)| cell)
                .collect();
            cycle_cells.sort();
            return Err(CycleError {
                cycle_path: self.find_cycle_path(&cycle_cells),
            });
        }

        Ok(result)
    }

    /// Traces a cycle through the blocked cells for error reporting.
    /// Falls back to listing the blocked cells.
    fn find_cycle_path(&self, cycle_cells: &[&CellKey]) -> Vec<CellKey> {
        let Some(&start) = cycle_cells.first() else {
            return Vec::new();
        };

        let cell_set: HashSet<&CellKey> = cycle_cells.iter().copied().collect();
        let mut path = vec![start.clone()];
        let mut current = start;

        for _ in 0..cycle_cells.len() {
            let next = self.precedents.get(current).and_then(|precs| {
                let mut candidates: Vec<&CellKey> =
                    precs.iter().filter(|p| cell_set.contains(p)).collect();
                candidates.sort();
                candidates.first().copied()
            });
            let Some(next) = next else {
                break;
            };
            let seen = path.contains(next);
            path.push(next.clone());
            if seen {
                // Trim the lead-in so the path starts where the loop does.
                if let Some(pos) = path.iter().position(|k| k == next) {
                    return path.split_off(pos);
                }
                return path;
            }
            current = next;
        }

        cycle_cells.iter().map(|&k| k.clone()).collect()
    }

    /// Number of formula cells in the graph.
    pub fn formula_cell_count(&self) -> usize {
        self.formulas.len()
    }

    /// Number of precedent edges.
    pub fn dependency_count(&self) -> usize {
        self.precedents.values().map(|v| v.len()).sum()
    }

    pub fn clear(&mut self) {
        self.precedents.clear();
        self.dependents.clear();
        self.formulas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::model::{Column, Row, RowType};

    fn key(row: &str, col: &str) -> CellKey {
        CellKey::new(row, col)
    }

    fn set_of(keys: &[CellKey]) -> HashSet<CellKey> {
        keys.iter().cloned().collect()
    }

    #[test]
    fn test_set_and_get_dependencies() {
        let mut graph = DependencyGraph::new();
        let a1 = key("R1", "A");
        let a2 = key("R2", "A");
        let a3 = key("R3", "A");

        graph.set_dependencies(a3.clone(), set_of(&[a1.clone(), a2.clone()]));

        let precs = graph.get_precedents(&a3).unwrap();
        assert_eq!(precs.len(), 2);
        assert!(graph.get_dependents(&a1).unwrap().contains(&a3));
        assert!(graph.get_dependents(&a2).unwrap().contains(&a3));
    }

    #[test]
    fn test_update_dependencies() {
        let mut graph = DependencyGraph::new();
        let a1 = key("R1", "A");
        let a3 = key("R3", "A");
        let b1 = key("R1", "B");

        graph.set_dependencies(a3.clone(), set_of(&[a1.clone()]));
        graph.set_dependencies(a3.clone(), set_of(&[b1.clone()]));

        assert_eq!(graph.get_precedents(&a3).unwrap().len(), 1);
        assert!(graph.get_dependents(&a1).is_none());
        assert!(graph.get_dependents(&b1).unwrap().contains(&a3));

        graph.clear_dependencies(&a3);
        assert!(graph.get_precedents(&a3).is_none());
        assert_eq!(graph.formula_cell_count(), 0);
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = DependencyGraph::new();
        let a1 = key("R1", "A");
        let a2 = key("R2", "A");
        let a3 = key("R3", "A");

        assert!(graph.would_create_cycle(&a1, &set_of(&[a1.clone()])));

        graph.set_dependencies(a2.clone(), set_of(&[a1.clone()]));
        graph.set_dependencies(a3.clone(), set_of(&[a2.clone()]));
        assert!(graph.would_create_cycle(&a1, &set_of(&[a3.clone()])));
        assert!(!graph.would_create_cycle(&key("R1", "B"), &set_of(&[a3])));
    }

    #[test]
    fn test_recalc_order_diamond() {
        let mut graph = DependencyGraph::new();
        let a1 = key("R1", "A");
        let a2 = key("R2", "A");
        let a3 = key("R3", "A");
        let a4 = key("R4", "A");

        graph.set_dependencies(a2.clone(), set_of(&[a1.clone()]));
        graph.set_dependencies(a3.clone(), set_of(&[a1.clone()]));
        graph.set_dependencies(a4.clone(), set_of(&[a2.clone(), a3.clone()]));

        let order = graph.recalc_order(&a1).unwrap();
        assert_eq!(order, vec![a2, a3, a4]);
    }

    #[test]
    fn test_from_template_and_cycle_error() {
        let mut template = Template::new("T1");
        template.add_column(Column::new("C1", "A")).unwrap();
        let columns = template.report_data.columns.clone();
        for id in ["R1", "R2", "R3"] {
            template.add_row(Row::new(id, RowType::Data, &columns, 100), None).unwrap();
        }
        template.set_cell("R2", "C1", Cell::formula("cell_R1_C1 * 2")).unwrap();
        template.set_cell("R3", "C1", Cell::formula("cell_R2_C1 + cell_R9_C1")).unwrap();

        let graph = DependencyGraph::from_template(&template);
        assert_eq!(graph.formula_cell_count(), 2);
        // The dangling cell_R9_C1 is not an edge.
        assert_eq!(graph.dependency_count(), 2);
        assert_eq!(
            graph.evaluation_order().unwrap(),
            vec![key("R2", "C1"), key("R3", "C1")]
        );

        template.set_cell("R1", "C1", Cell::formula("cell_R3_C1")).unwrap();
        let err = DependencyGraph::from_template(&template)
            .evaluation_order()
            .unwrap_err();
        assert_eq!(err.cycle_path.first(), err.cycle_path.last());
        assert!(err.to_string().starts_with("Circular reference detected: cell_"));
    }
}

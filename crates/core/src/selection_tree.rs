//! Two-level tri-state selection over groups and their leaves.
//!
//! The same tree backs both the data-sources picker (databases holding
//! tables) and the schema setup step (tables holding columns). Groups carry
//! their own boolean flag; the "partial" state is never stored and only
//! surfaces through [`SelectionTree::group_state`] and the counters.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::schema_discovery::{DatabaseSchema, SchemaCatalog};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    pub name: String,
    pub selected: bool,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
}

impl Leaf {
    #[must_use]
    pub fn new(name: impl Into<String>, selected: bool) -> Self {
        Self {
            name: name.into(),
            selected,
            annotation: None,
            data_type: None,
        }
    }

    #[must_use]
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub selected: bool,
    #[serde(default)]
    pub expanded: bool,
    #[serde(default)]
    pub leaves: Vec<Leaf>,
}

impl Group {
    #[must_use]
    pub fn new(name: impl Into<String>, selected: bool) -> Self {
        Self {
            name: name.into(),
            selected,
            expanded: false,
            leaves: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_leaf(mut self, leaf: Leaf) -> Self {
        self.leaves.push(leaf);
        self
    }

    #[must_use]
    pub fn expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    fn leaf_mut(&mut self, leaf_name: &str) -> Option<&mut Leaf> {
        self.leaves.iter_mut().find(|leaf| leaf.name == leaf_name)
    }

    fn selected_leaves(&self) -> usize {
        self.leaves.iter().filter(|leaf| leaf.selected).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionCounts {
    pub groups: usize,
    pub leaves: usize,
}

impl SelectionCounts {
    /// Renders e.g. `2 database(s) and 5 table(s)`.
    #[must_use]
    pub fn describe(&self, group_noun: &str, leaf_noun: &str) -> String {
        format!(
            "{} {group_noun}(s) and {} {leaf_noun}(s)",
            self.groups, self.leaves
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    Checked,
    Unchecked,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeEntry {
    pub group: String,
    pub leaf: String,
}

impl fmt::Display for ScopeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.leaf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("group `{0}` appears more than once")]
    DuplicateGroup(String),
    #[error("leaf `{leaf}` appears more than once in group `{group}`")]
    DuplicateLeaf { group: String, leaf: String },
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown leaf `{leaf}` in group `{group}`")]
    UnknownLeaf { group: String, leaf: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionTree {
    groups: Vec<Group>,
}

impl SelectionTree {
    pub fn new(groups: Vec<Group>) -> Result<Self, SelectionError> {
        let mut group_names = HashSet::with_capacity(groups.len());
        for group in &groups {
            if !group_names.insert(group.name.as_str()) {
                return Err(SelectionError::DuplicateGroup(group.name.clone()));
            }
            let mut leaf_names = HashSet::with_capacity(group.leaves.len());
            for leaf in &group.leaves {
                if !leaf_names.insert(leaf.name.as_str()) {
                    return Err(SelectionError::DuplicateLeaf {
                        group: group.name.clone(),
                        leaf: leaf.name.clone(),
                    });
                }
            }
        }
        Ok(Self { groups })
    }

    /// Databases become groups and their tables become leaves.
    pub fn from_catalog_databases(
        catalog: &SchemaCatalog,
        selected: bool,
    ) -> Result<Self, SelectionError> {
        let groups = catalog
            .databases
            .iter()
            .map(|database| Group {
                name: database.name.clone(),
                selected,
                expanded: false,
                leaves: database
                    .tables
                    .iter()
                    .map(|table| Leaf::new(table.name.clone(), selected))
                    .collect(),
            })
            .collect();
        Self::new(groups)
    }

    /// Tables become groups and their columns become leaves; column types
    /// and descriptions are carried over as leaf metadata.
    pub fn from_database_columns(
        database: &DatabaseSchema,
        selected: bool,
    ) -> Result<Self, SelectionError> {
        let groups = database
            .tables
            .iter()
            .map(|table| Group {
                name: table.name.clone(),
                selected,
                expanded: false,
                leaves: table
                    .columns
                    .iter()
                    .map(|column| Leaf {
                        name: column.name.clone(),
                        selected,
                        annotation: column.description.clone(),
                        data_type: Some(column.data_type.clone()),
                    })
                    .collect(),
            })
            .collect();
        Self::new(groups)
    }

    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Flips the group flag and writes the new value into every leaf.
    pub fn toggle_group(&mut self, group_name: &str) -> Result<bool, SelectionError> {
        let group = self.group_mut(group_name)?;
        group.selected = !group.selected;
        let selected = group.selected;
        for leaf in &mut group.leaves {
            leaf.selected = selected;
        }
        debug!(group = group_name, selected, "toggled group");
        Ok(selected)
    }

    /// Flips one leaf, then pulls the group flag to `true` when every leaf is
    /// selected and to `false` when none are. A mix keeps the old group flag.
    pub fn toggle_leaf(&mut self, group_name: &str, leaf_name: &str) -> Result<bool, SelectionError> {
        let group = self.group_mut(group_name)?;
        let leaf = group
            .leaf_mut(leaf_name)
            .ok_or_else(|| SelectionError::UnknownLeaf {
                group: group_name.to_string(),
                leaf: leaf_name.to_string(),
            })?;
        leaf.selected = !leaf.selected;
        let selected = leaf.selected;

        let selected_leaves = group.selected_leaves();
        if selected_leaves == group.leaves.len() {
            group.selected = true;
        } else if selected_leaves == 0 {
            group.selected = false;
        }
        debug!(
            group = group_name,
            leaf = leaf_name,
            selected,
            group_selected = group.selected,
            "toggled leaf"
        );
        Ok(selected)
    }

    pub fn toggle_expansion(&mut self, group_name: &str) -> Result<bool, SelectionError> {
        let group = self.group_mut(group_name)?;
        group.expanded = !group.expanded;
        Ok(group.expanded)
    }

    pub fn set_leaf_annotation(
        &mut self,
        group_name: &str,
        leaf_name: &str,
        text: impl Into<String>,
    ) -> Result<(), SelectionError> {
        let group = self.group_mut(group_name)?;
        let leaf = group
            .leaf_mut(leaf_name)
            .ok_or_else(|| SelectionError::UnknownLeaf {
                group: group_name.to_string(),
                leaf: leaf_name.to_string(),
            })?;
        leaf.annotation = Some(text.into());
        Ok(())
    }

    /// Counts selected groups, and selected leaves whose group is selected
    /// too. A selected leaf under an unselected group is out of scope and is
    /// never counted.
    #[must_use]
    pub fn counts(&self) -> SelectionCounts {
        self.groups
            .iter()
            .filter(|group| group.selected)
            .fold(SelectionCounts::default(), |mut counts, group| {
                counts.groups += 1;
                counts.leaves += group.selected_leaves();
                counts
            })
    }

    /// Effective leaves in tree order, gated the same way as [`Self::counts`].
    #[must_use]
    pub fn in_scope(&self) -> Vec<ScopeEntry> {
        self.groups
            .iter()
            .filter(|group| group.selected)
            .flat_map(|group| {
                group
                    .leaves
                    .iter()
                    .filter(|leaf| leaf.selected)
                    .map(move |leaf| ScopeEntry {
                        group: group.name.clone(),
                        leaf: leaf.name.clone(),
                    })
            })
            .collect()
    }

    /// Scope indicator text for a databases/tables tree.
    #[must_use]
    pub fn scope_summary(&self) -> String {
        format!(
            "Query has access to {}",
            self.counts().describe("database", "table")
        )
    }

    pub fn group_state(&self, group_name: &str) -> Result<TriState, SelectionError> {
        let group = self
            .group(group_name)
            .ok_or_else(|| SelectionError::UnknownGroup(group_name.to_string()))?;
        Ok(tri_state(group))
    }

    pub fn group_progress(&self, group_name: &str) -> Result<(usize, usize), SelectionError> {
        let group = self
            .group(group_name)
            .ok_or_else(|| SelectionError::UnknownGroup(group_name.to_string()))?;
        Ok((group.selected_leaves(), group.leaves.len()))
    }

    pub fn is_leaf_effective(
        &self,
        group_name: &str,
        leaf_name: &str,
    ) -> Result<bool, SelectionError> {
        let group = self
            .group(group_name)
            .ok_or_else(|| SelectionError::UnknownGroup(group_name.to_string()))?;
        let leaf = group
            .leaves
            .iter()
            .find(|leaf| leaf.name == leaf_name)
            .ok_or_else(|| SelectionError::UnknownLeaf {
                group: group_name.to_string(),
                leaf: leaf_name.to_string(),
            })?;
        Ok(group.selected && leaf.selected)
    }

    /// Hands the final structure back to the host.
    #[must_use]
    pub fn commit(self) -> Vec<Group> {
        let counts = self.counts();
        info!(
            groups = counts.groups,
            leaves = counts.leaves,
            "selection committed"
        );
        self.groups
    }

    fn group_mut(&mut self, group_name: &str) -> Result<&mut Group, SelectionError> {
        self.groups
            .iter_mut()
            .find(|group| group.name == group_name)
            .ok_or_else(|| SelectionError::UnknownGroup(group_name.to_string()))
    }
}

fn tri_state(group: &Group) -> TriState {
    let selected_leaves = group.selected_leaves();
    if selected_leaves > 0 && selected_leaves < group.leaves.len() {
        TriState::Partial
    } else if group.selected {
        TriState::Checked
    } else {
        TriState::Unchecked
    }
}

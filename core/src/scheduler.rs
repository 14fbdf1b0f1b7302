//! Phase scheduling
//!
//! Assigns a database's scanned objects to ordered emission phases. The
//! default strategy uses five fixed phases, one per dependency tier:
//!
//! 1. containers: schemas, types, full-text catalogs and stop lists
//! 2. structure: tables and views with primary and unique keys only
//! 3. attachments: indexes, triggers and statistics of phase 2 objects
//! 4. cross references: foreign keys and check constraints of every table
//! 5. programmability: stored procedures and functions
//!
//! The dependency strategy instead sorts every object topologically and emits
//! it once with all dependent features inline.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{info, warn};

use crate::domain::{CollectionKind, PhaseKind, RenderOptions, SchedulingStrategy};
use crate::object::{CatalogObject, Dependency, DependencyKey, ForeignKey, ObjectName, SchemaObject};
use crate::scanner::ScannedCollection;

const CONTAINERS: &[CollectionKind] = &[
    CollectionKind::Schemas,
    CollectionKind::UserDefinedDataTypes,
    CollectionKind::UserDefinedTypes,
    CollectionKind::UserDefinedTableTypes,
    CollectionKind::FullTextCatalogs,
    CollectionKind::FullTextStopLists,
];

const STRUCTURE: &[CollectionKind] = &[CollectionKind::Tables, CollectionKind::Views];

const PROGRAMMABILITY: &[CollectionKind] = &[
    CollectionKind::StoredProcedures,
    CollectionKind::UserDefinedFunctions,
];

/// An ordered stage of emission with its rendering profile
pub struct Phase<'a> {
    pub kind: PhaseKind,
    pub options: RenderOptions,
    pub objects: Vec<&'a dyn SchemaObject>,
}

impl<'a> Phase<'a> {
    fn new(kind: PhaseKind, objects: Vec<&'a dyn SchemaObject>) -> Self {
        Self {
            kind,
            options: kind.options(),
            objects,
        }
    }

    /// Qualified identities of the phase's objects, in order
    pub fn identities(&self) -> Vec<String> {
        self.objects.iter().map(|o| o.identity()).collect()
    }
}

/// Builds the phase sequence for one database
pub struct PhaseScheduler;

impl PhaseScheduler {
    /// Phases for `collections` under `strategy`. The dependency strategy
    /// falls back to fixed phases when `dependencies` is `None` or the graph
    /// is cyclic.
    pub fn schedule<'a>(
        collections: &'a [ScannedCollection],
        strategy: SchedulingStrategy,
        dependencies: Option<&[Dependency]>,
    ) -> Vec<Phase<'a>> {
        for (table, fk) in Self::unexported_references(collections) {
            warn!(
                "Foreign key {} on {} references {}, which is not part of the export",
                fk.identity(),
                table,
                fk.references
            );
        }

        match (strategy, dependencies) {
            (SchedulingStrategy::Phases, _) => Self::fixed_phases(collections),
            (SchedulingStrategy::Dependencies, None) => {
                info!("Catalog provides no dependency information, using fixed phases");
                Self::fixed_phases(collections)
            }
            (SchedulingStrategy::Dependencies, Some(deps)) => {
                match Self::dependency_order(collections, deps) {
                    Ok(phase) => vec![phase],
                    Err(cycle) => {
                        warn!(
                            "Dependency cycle blocks {}, using fixed phases",
                            cycle.join(", ")
                        );
                        Self::fixed_phases(collections)
                    }
                }
            }
        }
    }

    /// The five fixed phases
    pub fn fixed_phases(collections: &[ScannedCollection]) -> Vec<Phase<'_>> {
        let structure: Vec<&CatalogObject> = objects_of(collections, STRUCTURE).collect();
        let attachments = structure.iter().copied().flat_map(|o| o.attachments()).collect();

        let mut cross_references: Vec<&dyn SchemaObject> = Vec::new();
        for table in structure.iter().copied().filter_map(CatalogObject::as_table) {
            cross_references.extend(table.foreign_keys.iter().map(|fk| fk as &dyn SchemaObject));
            cross_references.extend(table.checks.iter().map(|c| c as &dyn SchemaObject));
        }

        vec![
            Phase::new(
                PhaseKind::Containers,
                objects_of(collections, CONTAINERS).map(as_dyn).collect(),
            ),
            Phase::new(
                PhaseKind::Structure,
                structure.iter().copied().map(as_dyn).collect(),
            ),
            Phase::new(PhaseKind::Attachments, attachments),
            Phase::new(PhaseKind::CrossReferences, cross_references),
            Phase::new(
                PhaseKind::Programmability,
                objects_of(collections, PROGRAMMABILITY).map(as_dyn).collect(),
            ),
        ]
    }

    /// A single phase in topological order, or the identities of the objects
    /// a cycle prevents from being ordered. Ties are broken by scan order.
    pub fn dependency_order<'a>(
        collections: &'a [ScannedCollection],
        dependencies: &[Dependency],
    ) -> std::result::Result<Phase<'a>, Vec<String>> {
        let nodes: Vec<&CatalogObject> = collections.iter().flat_map(|c| c.objects.iter()).collect();

        let mut by_key: HashMap<DependencyKey, Vec<usize>> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            by_key.entry(node.dependency_key()).or_default().push(i);
        }

        // (dependent, prerequisite) pairs between nodes of this export
        let mut edges: HashSet<(usize, usize)> = HashSet::new();
        for (i, node) in nodes.iter().enumerate() {
            for key in node.intrinsic_dependencies() {
                for &j in by_key.get(&key).into_iter().flatten() {
                    edges.insert((i, j));
                }
            }
        }
        for dep in dependencies {
            if let (Some(froms), Some(tos)) = (by_key.get(&dep.from), by_key.get(&dep.to)) {
                for &i in froms {
                    for &j in tos {
                        edges.insert((i, j));
                    }
                }
            }
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut in_degree = vec![0usize; nodes.len()];
        for &(dependent, prerequisite) in &edges {
            if dependent != prerequisite {
                dependents[prerequisite].push(dependent);
                in_degree[dependent] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if order.len() < nodes.len() {
            return Err((0..nodes.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| nodes[i].identity())
                .collect());
        }

        Ok(Phase::new(
            PhaseKind::Ordered,
            order.into_iter().map(|i| as_dyn(nodes[i])).collect(),
        ))
    }

    /// Foreign keys whose referenced table is not among the scanned tables,
    /// paired with the identity of the owning table
    pub fn unexported_references(
        collections: &[ScannedCollection],
    ) -> Vec<(String, &ForeignKey)> {
        let tables: Vec<_> = objects_of(collections, &[CollectionKind::Tables])
            .filter_map(CatalogObject::as_table)
            .collect();
        let exported: HashSet<ObjectName> = tables.iter().map(|t| t.object_name()).collect();

        tables
            .iter()
            .flat_map(|t| {
                t.foreign_keys
                    .iter()
                    .filter(|fk| !exported.contains(&fk.references))
                    .map(|fk| (t.identity(), fk))
            })
            .collect()
    }
}

fn objects_of<'a>(
    collections: &'a [ScannedCollection],
    kinds: &'a [CollectionKind],
) -> impl Iterator<Item = &'a CatalogObject> + 'a {
    collections
        .iter()
        .filter(move |c| kinds.contains(&c.kind))
        .flat_map(|c| c.objects.iter())
}

fn as_dyn(object: &CatalogObject) -> &dyn SchemaObject {
    object
}

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use located_error::*;
use sample_data::{Ancestor, AncestorSink, GenotypeSource, InMemoryAncestorSink, InMemorySampleData};
use serde::{Deserialize, Serialize};
use tree_sequence::TreeSequenceBuilder;

use crate::error::OrchestratorError;
use crate::provenance::Provenance;

/// The sites of a [`GenotypeSource`] that qualify as inference sites (`1 < f <
/// N`), renumbered into a dense index space `[0, num_inference_sites)`. The
/// core (`ancestor-builder`, `tree-sequence`, `ancestor-matcher`) operates
/// exclusively in this space; `positions`/`original_site_id` translate back.
pub struct InferenceSites {
    pub positions: Vec<f64>,
    pub original_site_id: Vec<u32>,
}

impl InferenceSites {
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Scan every site of `samples`, keep the inference sites in ascending
/// original-site order, and register each into a fresh [`AncestorBuilder`]
/// under its dense inference-site index.
pub fn select_inference_sites(
    samples: &impl GenotypeSource,
) -> Result<(ancestor_builder::AncestorBuilder, InferenceSites), OrchestratorError> {
    let mut builder = ancestor_builder::AncestorBuilder::new(samples.num_samples());
    let mut positions = Vec::new();
    let mut original_site_id = Vec::new();

    for (site_id, site) in samples.sites() {
        if !site.is_inference_site(samples.num_samples()) {
            continue;
        }
        let inference_id = positions.len() as u32;
        builder
            .add_site(inference_id, site.frequency(), &site.genotypes)
            .map_err(|e| OrchestratorError::InternalInvariant(e.to_string()))?;
        positions.push(site.position);
        original_site_id.push(site_id);
    }

    Ok((builder, InferenceSites { positions, original_site_id }))
}

#[derive(Debug, Serialize, Deserialize)]
struct SiteRecord {
    position: f64,
    ancestral_state: String,
    derived_state: String,
    genotypes: Vec<u8>,
}

/// The `.samples` artifact: a small self-describing stand-in for the columnar
/// on-disk sample-data store, sufficient to round-trip an [`InMemorySampleData`].
#[derive(Debug, Serialize, Deserialize)]
pub struct SamplesArtifact {
    num_samples: u32,
    sequence_length: f64,
    sites: Vec<SiteRecord>,
}

impl SamplesArtifact {
    #[must_use]
    pub fn from_source(source: &impl GenotypeSource) -> Self {
        let sites = source
            .sites()
            .map(|(_, site)| SiteRecord {
                position: site.position,
                ancestral_state: site.ancestral_state.clone(),
                derived_state: site.derived_state.clone(),
                genotypes: site.genotypes.clone(),
            })
            .collect();
        Self { num_samples: source.num_samples(), sequence_length: source.sequence_length(), sites }
    }

    pub fn load(path: &Path) -> anyhow::Result<InMemorySampleData> {
        let file = File::open(path).with_loc(|| format!("While opening samples artifact {}", path.display()))?;
        let artifact: Self = serde_yaml::from_reader(file)
            .with_loc(|| format!("While parsing samples artifact {}", path.display()))?;
        let mut builder = InMemorySampleData::builder(artifact.num_samples, artifact.sequence_length);
        for site in artifact.sites {
            builder
                .add_site(site.position, site.ancestral_state, site.derived_state, site.genotypes)
                .map_err(|e| OrchestratorError::Artifact { path: path.display().to_string(), reason: e.to_string() })
                .with_loc(|| format!("While reloading samples artifact {}", path.display()))?;
        }
        Ok(builder.finalise())
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path).with_loc(|| format!("While creating samples artifact {}", path.display()))?;
        serde_yaml::to_writer(BufWriter::new(file), self)
            .with_loc(|| format!("While writing samples artifact {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AncestorRecord {
    start: i32,
    end: i32,
    time: u32,
    focal_sites: Vec<i32>,
    haplotype: Vec<u8>,
}

/// The `.ancestors` artifact produced by `build-ancestors`: every ancestor in
/// the sink's emission order (ultimate, root, then real descriptors), plus the
/// provenance of the run that built it.
#[derive(Debug, Serialize, Deserialize)]
pub struct AncestorsArtifact {
    num_sites: u32,
    ancestors: Vec<AncestorRecord>,
    pub provenance: Provenance,
}

impl AncestorsArtifact {
    #[must_use]
    pub fn from_sink(num_sites: u32, sink: &InMemoryAncestorSink, provenance: Provenance) -> Self {
        let ancestors = sink
            .iter()
            .map(|a| AncestorRecord {
                start: a.start,
                end: a.end,
                time: a.time,
                focal_sites: a.focal_sites.clone(),
                haplotype: a.haplotype.clone(),
            })
            .collect();
        Self { num_sites, ancestors, provenance }
    }

    pub fn load(path: &Path) -> anyhow::Result<(u32, InMemoryAncestorSink)> {
        let file = File::open(path).with_loc(|| format!("While opening ancestors artifact {}", path.display()))?;
        let artifact: Self = serde_yaml::from_reader(file)
            .with_loc(|| format!("While parsing ancestors artifact {}", path.display()))?;
        let mut sink = InMemoryAncestorSink::with_capacity(artifact.ancestors.len());
        for (index, record) in artifact.ancestors.into_iter().enumerate() {
            let ancestor = Ancestor {
                start: record.start,
                end: record.end,
                time: record.time,
                focal_sites: record.focal_sites,
                haplotype: record.haplotype,
            };
            sink.push(index, ancestor)
                .map_err(|e| OrchestratorError::Artifact { path: path.display().to_string(), reason: e.to_string() })
                .with_loc(|| format!("While reloading ancestors artifact {}", path.display()))?;
        }
        Ok((artifact.num_sites, sink))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path).with_loc(|| format!("While creating ancestors artifact {}", path.display()))?;
        serde_yaml::to_writer(BufWriter::new(file), self)
            .with_loc(|| format!("While writing ancestors artifact {}", path.display()))?;
        Ok(())
    }
}

/// The `.trees` artifact: a full snapshot of a [`TreeSequenceBuilder`] plus the
/// inference-site position map needed to rescale `edge.left`/`edge.right` back
/// to real positions, and this run's provenance.
#[derive(Debug, Serialize, Deserialize)]
pub struct TreesArtifact {
    num_sites: u32,
    node_times: Vec<f64>,
    node_flags: Vec<u8>,
    edge_left: Vec<f64>,
    edge_right: Vec<f64>,
    edge_parent: Vec<u32>,
    edge_child: Vec<u32>,
    mutation_site: Vec<u32>,
    mutation_node: Vec<u32>,
    mutation_derived_state: Vec<u8>,
    site_positions: Vec<f64>,
    sequence_length: f64,
    pub provenance: Provenance,
}

impl TreesArtifact {
    #[must_use]
    pub fn from_builder(
        builder: &TreeSequenceBuilder,
        site_positions: Vec<f64>,
        sequence_length: f64,
        provenance: Provenance,
    ) -> Self {
        let (node_times, node_flags) = builder.dump_nodes();
        let (edge_left, edge_right, edge_parent, edge_child) = builder.dump_edges();
        let (mutation_site, mutation_node, mutation_derived_state) = builder.dump_mutations();
        Self {
            num_sites: builder.num_sites(),
            node_times,
            node_flags,
            edge_left,
            edge_right,
            edge_parent,
            edge_child,
            mutation_site,
            mutation_node,
            mutation_derived_state,
            site_positions,
            sequence_length,
            provenance,
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<(TreeSequenceBuilder, Vec<f64>, f64)> {
        let file = File::open(path).with_loc(|| format!("While opening trees artifact {}", path.display()))?;
        let artifact: Self = serde_yaml::from_reader(file)
            .with_loc(|| format!("While parsing trees artifact {}", path.display()))?;

        let mut builder = TreeSequenceBuilder::new(artifact.num_sites);
        builder.restore_nodes(&artifact.node_times, &artifact.node_flags);
        builder
            .restore_edges(&artifact.edge_left, &artifact.edge_right, &artifact.edge_parent, &artifact.edge_child)
            .map_err(|e| OrchestratorError::Artifact { path: path.display().to_string(), reason: e.to_string() })
            .with_loc(|| format!("While restoring edges from trees artifact {}", path.display()))?;
        builder
            .restore_mutations(&artifact.mutation_site, &artifact.mutation_node, &artifact.mutation_derived_state)
            .map_err(|e| OrchestratorError::Artifact { path: path.display().to_string(), reason: e.to_string() })
            .with_loc(|| format!("While restoring mutations from trees artifact {}", path.display()))?;

        Ok((builder, artifact.site_positions, artifact.sequence_length))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path).with_loc(|| format!("While creating trees artifact {}", path.display()))?;
        serde_yaml::to_writer(BufWriter::new(file), self)
            .with_loc(|| format!("While writing trees artifact {}", path.display()))?;
        Ok(())
    }
}
